use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Byte-addressed, little-endian memory as seen by the core. Accesses may be
/// unaligned.
pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> Result<u8>;
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()>;

    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        let lo = self.read_u8(addr)?;
        let hi = self.read_u8(addr.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        let mut b = [0u8; 4];
        for (i, slot) in b.iter_mut().enumerate() {
            *slot = self.read_u8(addr.wrapping_add(i as u32))?;
        }
        Ok(u32::from_le_bytes(b))
    }
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<()> {
        for (i, byte) in val.to_le_bytes().into_iter().enumerate() {
            self.write_u8(addr.wrapping_add(i as u32), byte)?;
        }
        Ok(())
    }
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<()> {
        for (i, byte) in val.to_le_bytes().into_iter().enumerate() {
            self.write_u8(addr.wrapping_add(i as u32), byte)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Unmapped address {addr:#010x}")]
    Unmapped { addr: u32 },
    #[error("Region '{name}' at {start:#010x}+{size:#x} overlaps '{existing}'")]
    Overlap {
        name: String,
        start: u32,
        size: u32,
        existing: String,
    },
    #[error("Region '{name}' at {start:#010x}+{size:#x} runs past the address space")]
    OutOfRange { name: String, start: u32, size: u32 },
}

/// One flat buffer mapped at `base`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub base: u32,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0; size],
            base: 0,
        }
    }

    pub fn with_base(size: usize, base: u32) -> Self {
        Self {
            mem: vec![0; size],
            base,
        }
    }

    /// Copy `bytes` to `addr`, failing if any byte falls outside the buffer.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let off = self.offset(addr)?;
        let end = off + bytes.len();
        if end > self.mem.len() {
            return Err(MemoryError::Unmapped {
                addr: addr.wrapping_add((self.mem.len() - off) as u32),
            });
        }
        self.mem[off..end].copy_from_slice(bytes);
        Ok(())
    }

    fn offset(&self, addr: u32) -> Result<usize, MemoryError> {
        let off = addr.wrapping_sub(self.base) as usize;
        if off < self.mem.len() {
            Ok(off)
        } else {
            Err(MemoryError::Unmapped { addr })
        }
    }
}

impl Bus for LinearMemory {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        Ok(self.mem[self.offset(addr)?])
    }
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()> {
        let off = self.offset(addr)?;
        self.mem[off] = val;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub start: u32,
    pub data: Vec<u8>,
}

impl Region {
    fn end(&self) -> u64 {
        self.start as u64 + self.data.len() as u64
    }

    fn contains(&self, addr: u32) -> bool {
        (self.start as u64..self.end()).contains(&(addr as u64))
    }
}

/// Named RAM regions. Regions never overlap; a multi-byte access may span
/// two adjacent regions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_ram(&mut self, name: &str, start: u32, size: u32) -> Result<(), MemoryError> {
        let end = start as u64 + size as u64;
        if end > 1u64 << 32 {
            return Err(MemoryError::OutOfRange {
                name: name.to_string(),
                start,
                size,
            });
        }
        if let Some(existing) = self
            .regions
            .iter()
            .find(|r| (start as u64) < r.end() && (r.start as u64) < end)
        {
            return Err(MemoryError::Overlap {
                name: name.to_string(),
                start,
                size,
                existing: existing.name.clone(),
            });
        }
        debug!(name, start, size, "map ram");
        self.regions.push(Region {
            name: name.to_string(),
            start,
            data: vec![0; size as usize],
        });
        Ok(())
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn is_mapped(&self, addr: u32) -> bool {
        self.regions.iter().any(|r| r.contains(addr))
    }

    /// Copy `bytes` starting at `addr`. Every target byte must be mapped.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        for (i, &b) in bytes.iter().enumerate() {
            self.store(addr.wrapping_add(i as u32), b)?;
        }
        Ok(())
    }

    fn slot(&mut self, addr: u32) -> Result<&mut u8, MemoryError> {
        self.regions
            .iter_mut()
            .find(|r| r.contains(addr))
            .map(|r| &mut r.data[(addr - r.start) as usize])
            .ok_or(MemoryError::Unmapped { addr })
    }

    fn store(&mut self, addr: u32, val: u8) -> Result<(), MemoryError> {
        *self.slot(addr)? = val;
        Ok(())
    }
}

impl Bus for MemoryMap {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        Ok(*self.slot(addr)?)
    }
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()> {
        Ok(self.store(addr, val)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn overlapping_regions_are_rejected() {
        let mut map = MemoryMap::new();
        map.map_ram("low", 0x0000, 0x1000).unwrap();
        map.map_ram("high", 0x1000, 0x1000).unwrap();
        let err = map.map_ram("clash", 0x0FFF, 2).unwrap_err();
        assert_eq!(
            err,
            MemoryError::Overlap {
                name: "clash".into(),
                start: 0x0FFF,
                size: 2,
                existing: "low".into(),
            }
        );
        assert!(map.map_ram("wrap", 0xFFFF_FFF0, 0x20).is_err());
        assert!(map.map_ram("top", 0xFFFF_FFF0, 0x10).is_ok());
    }

    #[test]
    fn access_may_straddle_adjacent_regions() {
        let mut map = MemoryMap::new();
        map.map_ram("a", 0, 4).unwrap();
        map.map_ram("b", 4, 4).unwrap();
        map.write_u32(2, 0xDEAD_BEEF).unwrap();
        assert_eq!(map.read_u32(2).unwrap(), 0xDEAD_BEEF);
        assert_eq!(map.read_u16(3).unwrap(), 0xADBE);
    }

    #[test]
    fn unmapped_access_reports_the_first_missing_byte() {
        let mut map = MemoryMap::new();
        map.map_ram("a", 0, 4).unwrap();
        let err = map.read_u32(2).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MemoryError>(),
            Some(&MemoryError::Unmapped { addr: 4 })
        );
    }

    #[test]
    fn linear_memory_honours_base() {
        let mut mem = LinearMemory::with_base(8, 0x8000_0000);
        mem.write_u32(0x8000_0004, 0x0102_0304).unwrap();
        assert_eq!(mem.mem[4..], [4, 3, 2, 1]);
        assert!(mem.read_u8(0x7FFF_FFFF).is_err());
        assert!(mem.read_u32(0x8000_0006).is_err());
        assert!(mem.load(0x8000_0006, &[1, 2, 3]).is_err());
    }
}
