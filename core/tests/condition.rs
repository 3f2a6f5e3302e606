use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use mcdecoder_core::{
    condition::{Condition, Functions},
    desc::InstructionDescription,
    error::{ConditionErrorKind, Error},
    insn::InstructionDecoder,
};

const ADD: &str = "xxxx:cond|0010100|x:S|xxxx:Rn|xxxx:Rd|xxxxxxxxxxxx:imm12";
const PAIR: &str = "xxxx:r|000000000000,xxxx:r|000000000000";

fn compile(desc: InstructionDescription) -> InstructionDecoder {
    InstructionDecoder::compile(&desc).unwrap()
}

fn condition_error(desc: InstructionDescription) -> ConditionErrorKind {
    match InstructionDecoder::compile(&desc) {
        Err(Error::Condition(err)) => err.kind().clone(),
        res => panic!("expected condition error, got {res:?}"),
    }
}

fn counter() -> (Arc<AtomicUsize>, Functions) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let functions = Functions::new().register("count", move |value, _| {
        c.fetch_add(1, Ordering::Relaxed);
        value
    });
    (calls, functions)
}

#[test]
fn unmatch_condition() {
    let insn = compile(InstructionDescription::new("add_1", ADD).unmatch_condition("cond == 15"));
    let functions = Functions::new();
    assert!(insn.confirm(0xe282_1005, &functions).unwrap());
    assert!(!insn.confirm(0xf282_1005, &functions).unwrap());
    assert!(!insn.confirm(0xe382_1005, &functions).unwrap());
}

#[test]
fn in_range_gates_match() {
    let insn = compile(
        InstructionDescription::new("add_small", ADD).match_condition("imm12 in_range 0-255"),
    );
    let functions = Functions::new();
    assert!(!insn.confirm(0xe282_1100, &functions).unwrap());
    assert!(insn.confirm(0xe282_1080, &functions).unwrap());
    assert!(insn.confirm(0xe282_10ff, &functions).unwrap());
}

#[test]
fn operators() {
    let insn = compile(InstructionDescription::new("add_1", ADD));
    let functions = Functions::new().register("setbit_count", |v, _| v.count_ones() as u64);
    let code = 0xe282_1005;
    let cases = [
        ("Rn == 2", true),
        ("Rn != 2", false),
        ("Rd < 1", false),
        ("Rd <= 1", true),
        ("imm12 > 4", true),
        ("imm12 >= 6", false),
        ("Rn == Rd", false),
        ("cond in [0, 0xe]", true),
        ("cond in [0b1111]", false),
        ("setbit_count(imm12) == 2", true),
        ("Rn == 1 or Rd == 1 and imm12 == 5", true),
        ("(Rn == 1 or Rd == 1) and imm12 == 4", false),
    ];
    for (src, expected) in cases {
        let cond = mcdecoder_core::expr::parse("add_1", src).unwrap();
        cond.validate(&insn).unwrap();
        assert_eq!(cond.evaluate(&insn, code, &functions).unwrap(), expected, "{src}");
        let lanes = cond.evaluate_lanes(&insn, &[code], &functions).unwrap();
        assert_eq!(lanes, [expected], "{src}");
    }
}

#[test]
fn element_index() {
    let insn = compile(
        InstructionDescription::new("pair", PAIR).match_condition("r[1] == 5 and r[0] == 0x30"),
    );
    let r = insn.field("r").unwrap();
    assert_eq!(r.decode(0x3000_5000), 0x35);
    let functions = Functions::new();
    assert!(insn.confirm(0x3000_5000, &functions).unwrap());
    assert!(!insn.confirm(0x5000_3000, &functions).unwrap());
}

#[test]
fn compile_errors() {
    let new = InstructionDescription::new;
    assert_eq!(
        condition_error(new("add_1", ADD).match_condition("foo == 1")),
        ConditionErrorKind::UndefinedField("foo".into())
    );
    assert_eq!(
        condition_error(new("pair", PAIR).unmatch_condition("f(r[2]) == 0")),
        ConditionErrorKind::ElementIndex {
            field: "r".into(),
            index: 2,
            count: 2
        }
    );
    assert_eq!(
        condition_error(
            new("add_1", "11110|x:i|01000|x:S|xxxx:Rn,0|xxx:imm3|xxxx:Rd|xxxxxxxx:imm8")
                .match_condition("imm8[0] == 0")
        ),
        ConditionErrorKind::EmptyElement {
            field: "imm8".into(),
            index: 0
        }
    );
    assert!(matches!(
        condition_error(new("add_1", ADD).match_condition("cond ==")),
        ConditionErrorKind::Syntax { .. }
    ));
}

#[test]
fn unregistered_function() {
    let insn = compile(InstructionDescription::new("pair", PAIR).match_condition("f(r) == 1"));
    let err = insn.confirm(0, &Functions::new()).unwrap_err();
    assert_eq!(err.instruction(), "pair");
    assert_eq!(err.kind(), &ConditionErrorKind::UndefinedFunction("f".into()));
    let cond = insn.match_condition.as_ref().unwrap();
    assert!(cond.evaluate_lanes(&insn, &[0], &Functions::new()).is_err());
}

#[test]
fn function_context() {
    let insn = compile(InstructionDescription::new("pair", PAIR).match_condition("width(r) == 8"));
    let functions = Functions::new().register("width", |_, ctx| {
        ctx.instruction.field("r").map_or(0, |f| f.width() as u64)
    });
    assert!(insn.confirm(0x1000_1000, &functions).unwrap());
}

#[test]
fn short_circuit() {
    let insn = compile(InstructionDescription::new("pair", PAIR));
    let and = mcdecoder_core::expr::parse("pair", "r == 0 and count(r) == 0").unwrap();
    let or = mcdecoder_core::expr::parse("pair", "r == 0 or count(r) == 0").unwrap();

    let (calls, functions) = counter();
    assert!(!and.evaluate(&insn, 0x1000_0000, &functions).unwrap());
    assert!(or.evaluate(&insn, 0, &functions).unwrap());
    assert_eq!(calls.load(Ordering::Relaxed), 0);
    assert!(and.evaluate(&insn, 0, &functions).unwrap());
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    let (calls, functions) = counter();
    let codes = [0, 0x1000_0000, 0x0000_1000, 0];
    let lanes = and.evaluate_lanes(&insn, &codes, &functions).unwrap();
    assert_eq!(lanes, [true, false, false, true]);
    assert_eq!(calls.load(Ordering::Relaxed), 2);

    let (calls, functions) = counter();
    let lanes = or.evaluate_lanes(&insn, &codes, &functions).unwrap();
    assert_eq!(lanes, [true, false, false, true]);
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn lanes_agree_with_scalar() {
    let insn = compile(InstructionDescription::new("add_1", ADD));
    let functions = Functions::new().register("setbit_count", |v, _| v.count_ones() as u64);
    let sources = [
        "cond in_range 0-14 and (Rn == Rd or setbit_count(imm12) > 3)",
        "S == 1 or imm12 in [1, 2, 3] or Rd >= 8",
        "(cond != 15 or Rn < 4) and (imm12 <= 0x10 or Rd == Rn)",
    ];
    let codes: Vec<u64> = (0..512_u64)
        .map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15) >> 32)
        .collect();
    for src in sources {
        let cond: Condition = mcdecoder_core::expr::parse("add_1", src).unwrap();
        let lanes = cond.evaluate_lanes(&insn, &codes, &functions).unwrap();
        for (&code, lane) in codes.iter().zip(lanes) {
            let scalar = cond.evaluate(&insn, code, &functions).unwrap();
            assert_eq!(lane, scalar, "{src}: {code:#x}");
        }
    }
}
