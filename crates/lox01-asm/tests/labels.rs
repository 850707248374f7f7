use lox01_asm::assemble;
use pretty_assertions::assert_eq;

#[test]
fn backward_jump() {
    let asm = assemble("label1:nop\njmp label1").unwrap();
    assert_eq!(asm.code, vec![0x37, 0x02, 0xFA, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn forward_jump() {
    let asm = assemble("jmp label1\nnop\nlabel1:").unwrap();
    assert_eq!(asm.code, vec![0x02, 0x01, 0x00, 0x00, 0x00, 0x37]);
    assert_eq!(asm.labels.get("label1"), Some(&6));
}

#[test]
fn forward_short_branch() {
    let asm = assemble("jc label1\nnop\nlabel1:").unwrap();
    assert_eq!(asm.code, vec![0x0B, 0x01, 0x00, 0x37]);
}

#[test]
fn self_reference_on_the_defining_line() {
    // jmp at 0 jumping to itself: 0 - (1 + 4)
    let asm = assemble("spin: jmp spin").unwrap();
    assert_eq!(asm.code, vec![0x02, 0xFB, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn definition_order_does_not_change_output() {
    let forward = "\
        jz done
        call sub
        brk
    sub:
        ret
    done:
        brk";
    let hoisted = "\
        jz 7
        call 1
        brk
        ret
        brk";
    assert_eq!(assemble(forward).unwrap().code, assemble(hoisted).unwrap().code);

    let backward = "\
    sub:
        ret
    done:
        brk
        jz done
        call sub";
    let asm = assemble(backward).unwrap();
    // jz at 2, field at 3: 1 - 5; call at 5, field at 6: 0 - 10
    assert_eq!(
        asm.code,
        vec![0x32, 0x00, 0x03, 0xFC, 0xFF, 0x2E, 0xF6, 0xFF, 0xFF, 0xFF]
    );
}

#[test]
fn labels_are_case_sensitive() {
    let asm = assemble("Loop: nop\nloop: jmp Loop").unwrap();
    assert_eq!(asm.labels.len(), 2);
    assert_eq!(asm.labels["loop"], 1);
    assert_eq!(&asm.code[2..], &[0xFA, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn labels_before_directives() {
    let asm = assemble("jmp data\ndata: .word 0xDEADBEEF\nend:").unwrap();
    assert_eq!(asm.labels["data"], 5);
    assert_eq!(asm.labels["end"], 9);
    assert_eq!(&asm.code[1..5], &[0, 0, 0, 0]);
}

#[test]
fn symbols_serialize_as_json_map() {
    let asm = assemble("a: nop\nb: nop").unwrap();
    let json = serde_json::to_string(&asm.labels).unwrap();
    assert_eq!(json, r#"{"a":0,"b":1}"#);
}
