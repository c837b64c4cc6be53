use super::*;
use crate::crypto::key_pair::PrivateKey;
use crate::virtual_machine::builder::ScriptBuilder;
use crate::virtual_machine::host::{STORAGE_READ_GAS, StorageHost};
use crate::virtual_machine::state::{MemoryState, OverlayState, State};
use num_bigint::BigInt;

fn run_vm(script: &ScriptBuilder) -> VM {
    let mut vm = VM::new(script.to_bytes());
    vm.execute().expect("vm run failed");
    assert_eq!(vm.state(), VMState::Halt);
    vm
}

fn run_expect_err(script: &ScriptBuilder) -> VMError {
    let mut vm = VM::new(script.to_bytes());
    let err = vm.execute().expect_err("expected fault");
    assert_eq!(vm.state(), VMState::Fault);
    assert_eq!(vm.fault(), Some(&err));
    err
}

/// Evaluation stack as integers, bottom to top.
fn stack_ints(vm: &VM) -> Vec<i64> {
    let mut out: Vec<i64> = vm
        .eval_stack()
        .iter()
        .map(|item| item.as_int64().expect("integer on stack"))
        .collect();
    out.reverse();
    out
}

/// Evaluation stack as byte strings, bottom to top.
fn stack_bytes(vm: &VM) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = vm
        .eval_stack()
        .iter()
        .map(|item| item.as_bytes().expect("bytes on stack").to_vec())
        .collect();
    out.reverse();
    out
}

fn top(vm: &VM) -> &StackItem {
    vm.eval_stack().peek(0).expect("empty stack")
}

/// Pushes `values` in order, then runs `ops`, returning the stack.
fn run_ops(values: &[i64], ops: &[OpCode]) -> Vec<i64> {
    let mut b = ScriptBuilder::new();
    for v in values {
        b.emit_push_int(*v);
    }
    for op in ops {
        b.emit(*op);
    }
    stack_ints(&run_vm(&b))
}

fn ops_err(values: &[i64], ops: &[OpCode]) -> VMError {
    let mut b = ScriptBuilder::new();
    for v in values {
        b.emit_push_int(*v);
    }
    for op in ops {
        b.emit(*op);
    }
    run_expect_err(&b)
}

// ==================== Lifecycle ====================

#[test]
fn new_vm_starts_in_break() {
    let vm = VM::new(vec![0x51]);
    assert_eq!(vm.state(), VMState::Break);
    assert_eq!(vm.invocation_depth(), 1);
    assert!(vm.fault().is_none());
}

#[test]
fn empty_code_halts() {
    let mut vm = VM::new(Vec::<u8>::new());
    vm.execute().unwrap();
    assert_eq!(vm.state(), VMState::Halt);
    assert!(vm.eval_stack().is_empty());
    assert!(vm.current_context().is_none());
}

#[test]
fn step_executes_one_instruction() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1).emit_push_int(2).emit(OpCode::Add);
    let mut vm = VM::new(b.into_bytes());

    assert_eq!(vm.step().unwrap(), VMState::Break);
    assert_eq!(stack_ints(&vm), vec![1]);
    assert_eq!(vm.current_context().unwrap().ip(), 1);
    assert_eq!(vm.step().unwrap(), VMState::Break);
    assert_eq!(stack_ints(&vm), vec![1, 2]);
    assert_eq!(vm.step().unwrap(), VMState::Halt);
    assert_eq!(stack_ints(&vm), vec![3]);
    // Stepping a halted machine is a no-op.
    assert_eq!(vm.step().unwrap(), VMState::Halt);
}

#[test]
fn execute_resumes_after_step() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(4).emit_push_int(5).emit(OpCode::Mul);
    let mut vm = VM::new(b.into_bytes());
    vm.step().unwrap();
    vm.execute().unwrap();
    assert_eq!(stack_ints(&vm), vec![20]);
}

#[test]
fn fault_is_sticky() {
    let mut vm = VM::new(vec![OpCode::Drop as u8]);
    let first = vm.execute().unwrap_err();
    assert_eq!(first, VMError::StackUnderflow);
    assert_eq!(vm.execute().unwrap_err(), first);
    assert_eq!(vm.step().unwrap_err(), first);
    assert_eq!(vm.state(), VMState::Fault);
}

#[test]
fn fault_keeps_partial_effects() {
    // ADD pops both operands before rejecting the array.
    let mut b = ScriptBuilder::new();
    b.emit_push_int(9)
        .emit_push_int(1)
        .emit_push_int(0)
        .emit(OpCode::NewArray)
        .emit(OpCode::Add);
    let mut vm = VM::new(b.into_bytes());
    assert_eq!(
        vm.execute().unwrap_err(),
        VMError::TypeMismatch {
            expected: "Integer",
            actual: "Array"
        }
    );
    assert_eq!(stack_ints(&vm), vec![9]);
}

#[test]
fn unsupported_opcode_faults_with_offset() {
    let mut vm = VM::new(vec![0x51, 0xFF]);
    assert_eq!(
        vm.execute().unwrap_err(),
        VMError::UnsupportedOpcode {
            opcode: 0xFF,
            offset: 1
        }
    );
    assert_eq!(stack_ints(&vm), vec![1]);
}

#[test]
fn truncated_operand_is_malformed() {
    let mut vm = VM::new(vec![0x05, 0x01, 0x02]);
    assert!(matches!(
        vm.execute().unwrap_err(),
        VMError::MalformedInstruction { offset: 1, .. }
    ));

    let mut vm = VM::new(vec![OpCode::Jmp as u8, 0x01]);
    assert!(matches!(
        vm.execute().unwrap_err(),
        VMError::MalformedInstruction { .. }
    ));
}

// ==================== Push ====================

#[test]
fn push_constants() {
    let mut b = ScriptBuilder::new();
    b.emit(OpCode::PushM1)
        .emit(OpCode::Push0)
        .emit(OpCode::Push1)
        .emit(OpCode::Push8)
        .emit(OpCode::Push16);
    assert_eq!(stack_ints(&run_vm(&b)), vec![-1, 0, 1, 8, 16]);
}

#[test]
fn push_bytes_and_push_data() {
    let long = vec![0xAB; 300];
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(b"hello").emit_push_bytes(&long).emit_push_bytes(&[]);
    let vm = run_vm(&b);
    assert_eq!(stack_bytes(&vm), vec![b"hello".to_vec(), long, vec![]]);
    assert!(matches!(top(&vm), StackItem::ByteArray(_)));
}

#[test]
fn push_data4_respects_byte_array_limit() {
    let mut code = vec![OpCode::PushData4 as u8];
    code.extend_from_slice(&((MAX_BYTEARRAY + 1) as u32).to_le_bytes());
    code.extend(std::iter::repeat_n(0u8, MAX_BYTEARRAY + 1));
    let mut vm = VM::new(code);
    assert_eq!(
        vm.execute().unwrap_err(),
        VMError::SizeLimitExceeded {
            size: MAX_BYTEARRAY + 1,
            limit: MAX_BYTEARRAY
        }
    );
}

const MAX_BYTEARRAY: usize = crate::virtual_machine::value::MAX_BYTEARRAY_SIZE;

// ==================== Flow control ====================

#[test]
fn jmp_skips_code() {
    let mut b = ScriptBuilder::new();
    b.emit_jump(OpCode::Jmp, 4).unwrap(); // 0 -> 4
    b.emit(OpCode::Push1); // 3, skipped
    b.emit(OpCode::Push2); // 4
    assert_eq!(stack_ints(&run_vm(&b)), vec![2]);
}

#[test]
fn jmpif_loop_counts_down() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(3);
    let body = b.offset();
    b.emit(OpCode::Dec).emit(OpCode::Dup);
    b.emit_jump_to(OpCode::JmpIf, body).unwrap();
    assert_eq!(stack_ints(&run_vm(&b)), vec![0]);
}

#[test]
fn jmpifnot_branches_on_false() {
    let mut b = ScriptBuilder::new();
    b.emit_push_bool(false);
    b.emit_jump(OpCode::JmpIfNot, 4).unwrap(); // 1 -> 5
    b.emit(OpCode::Push1); // 4, skipped
    b.emit(OpCode::Push2); // 5
    assert_eq!(stack_ints(&run_vm(&b)), vec![2]);
}

#[test]
fn jump_to_end_of_code_halts() {
    let mut b = ScriptBuilder::new();
    b.emit_jump(OpCode::Jmp, 4).unwrap();
    b.emit(OpCode::Push1);
    assert!(stack_ints(&run_vm(&b)).is_empty());
}

#[test]
fn jump_out_of_range_is_malformed() {
    let mut b = ScriptBuilder::new();
    b.emit(OpCode::Nop);
    b.emit_jump(OpCode::Jmp, -2).unwrap();
    assert_eq!(
        run_expect_err(&b),
        VMError::MalformedInstruction {
            offset: 1,
            reason: "jump target out of range"
        }
    );

    let mut b = ScriptBuilder::new();
    b.emit_jump(OpCode::Jmp, 10).unwrap();
    assert!(matches!(
        run_expect_err(&b),
        VMError::MalformedInstruction { offset: 0, .. }
    ));
}

#[test]
fn call_and_ret_resume_after_operand() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1); // 0
    b.emit_jump(OpCode::Call, 5).unwrap(); // 1 -> 6
    b.emit_push_int(3); // 4
    b.emit(OpCode::Ret); // 5
    b.emit_push_int(2); // 6
    b.emit(OpCode::Ret); // 7
    let vm = run_vm(&b);
    assert_eq!(stack_ints(&vm), vec![1, 2, 3]);
    assert!(vm.alt_stack().is_empty());
}

#[test]
fn callee_running_off_the_end_returns() {
    let mut b = ScriptBuilder::new();
    b.emit_jump(OpCode::Call, 4).unwrap(); // 0 -> 4
    b.emit(OpCode::Ret); // 3
    b.emit_push_int(7); // 4
    assert_eq!(stack_ints(&run_vm(&b)), vec![7]);
}

#[test]
fn call_depth_is_bounded() {
    let mut b = ScriptBuilder::new();
    b.emit_jump(OpCode::Call, 0).unwrap();
    assert_eq!(
        run_expect_err(&b),
        VMError::StackOverflow {
            limit: MAX_INVOCATION_DEPTH
        }
    );
}

#[test]
fn nop_does_nothing() {
    assert_eq!(run_ops(&[5], &[OpCode::Nop]), vec![5]);
}

#[test]
fn throw_faults_at_offset() {
    let mut b = ScriptBuilder::new();
    b.emit(OpCode::Nop).emit(OpCode::Throw);
    assert_eq!(run_expect_err(&b), VMError::Throw { offset: 1 });
}

#[test]
fn throwifnot() {
    assert!(run_ops(&[1], &[OpCode::ThrowIfNot]).is_empty());
    assert_eq!(
        ops_err(&[0], &[OpCode::ThrowIfNot]),
        VMError::Throw { offset: 1 }
    );
}

// ==================== Stack ====================

#[test]
fn alt_stack_transfers() {
    let vm = {
        let mut b = ScriptBuilder::new();
        b.emit_push_int(1)
            .emit(OpCode::ToAltStack)
            .emit(OpCode::DupFromAltStack)
            .emit(OpCode::FromAltStack);
        run_vm(&b)
    };
    assert_eq!(stack_ints(&vm), vec![1, 1]);
    assert!(vm.alt_stack().is_empty());
}

#[test]
fn from_empty_alt_stack_underflows() {
    assert_eq!(ops_err(&[], &[OpCode::FromAltStack]), VMError::StackUnderflow);
}

#[test]
fn stack_ops() {
    let cases: &[(&[i64], OpCode, &[i64])] = &[
        (&[1, 2], OpCode::Swap, &[2, 1]),
        (&[3, 2, 1], OpCode::XDrop, &[2]),
        (&[3, 2, 1], OpCode::XSwap, &[2, 3]),
        (&[2, 1], OpCode::XTuck, &[2, 2]),
        (&[1, 2], OpCode::Depth, &[1, 2, 2]),
        (&[1, 2], OpCode::Drop, &[1]),
        (&[1, 2], OpCode::Dup, &[1, 2, 2]),
        (&[1, 2], OpCode::Nip, &[2]),
        (&[1, 2], OpCode::Over, &[1, 2, 1]),
        (&[3, 2, 1], OpCode::Pick, &[3, 2, 3]),
        (&[3, 2, 1], OpCode::Roll, &[2, 3]),
        (&[1, 2, 3], OpCode::Rot, &[2, 3, 1]),
        (&[1, 2], OpCode::Tuck, &[2, 1, 2]),
    ];
    for (input, op, expected) in cases {
        assert_eq!(&run_ops(input, &[*op]), expected, "{}", op.mnemonic());
    }
}

#[test]
fn xtuck_at_depth() {
    // n = 2 inserts a copy of the top below the second item.
    assert_eq!(run_ops(&[1, 2, 3, 2], &[OpCode::XTuck]), vec![1, 3, 2, 3]);
}

#[test]
fn negative_depth_is_out_of_bound() {
    assert!(matches!(
        ops_err(&[1, 2, -1], &[OpCode::Pick]),
        VMError::IndexOutOfBound { index: -1, .. }
    ));
}

#[test]
fn depth_past_bottom_underflows() {
    assert_eq!(ops_err(&[1, 5], &[OpCode::Roll]), VMError::StackUnderflow);
    assert_eq!(ops_err(&[1], &[OpCode::Over]), VMError::StackUnderflow);
}

#[test]
fn stack_limit_faults() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1);
    b.emit_jump(OpCode::Jmp, -1).unwrap();
    assert_eq!(
        run_expect_err(&b),
        VMError::StackOverflow { limit: STACK_LIMIT }
    );
}

// ==================== Splice ====================

fn run_splice(data: &[u8], args: &[i64], op: OpCode) -> Result<Vec<u8>, VMError> {
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(data);
    for a in args {
        b.emit_push_int(*a);
    }
    b.emit(op);
    let mut vm = VM::new(b.into_bytes());
    vm.execute()?;
    Ok(top(&vm).as_bytes()?.to_vec())
}

#[test]
fn substr_left_right() {
    assert_eq!(run_splice(b"aaabbb", &[1, 3], OpCode::Substr).unwrap(), b"aab");
    assert_eq!(run_splice(b"aaabbb", &[3], OpCode::Left).unwrap(), b"aaa");
    assert_eq!(run_splice(b"aaabbb", &[3], OpCode::Right).unwrap(), b"bbb");
    assert_eq!(run_splice(b"aaabbb", &[6, 0], OpCode::Substr).unwrap(), b"");
}

#[test]
fn splice_bounds_are_checked() {
    assert!(matches!(
        run_splice(b"aaabbb", &[4, 3], OpCode::Substr),
        Err(VMError::IndexOutOfBound { .. })
    ));
    assert!(matches!(
        run_splice(b"aaabbb", &[-1, 2], OpCode::Substr),
        Err(VMError::IndexOutOfBound { index: -1, .. })
    ));
    assert!(matches!(
        run_splice(b"aaabbb", &[1, -2], OpCode::Substr),
        Err(VMError::IndexOutOfBound { .. })
    ));
    assert!(matches!(
        run_splice(b"abc", &[4], OpCode::Left),
        Err(VMError::IndexOutOfBound { index: 4, len: 3 })
    ));
    assert!(matches!(
        run_splice(b"abc", &[-1], OpCode::Right),
        Err(VMError::IndexOutOfBound { index: -1, len: 3 })
    ));
}

#[test]
fn cat_and_size() {
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(b"aaa")
        .emit_push_bytes(b"bbb")
        .emit(OpCode::Cat)
        .emit(OpCode::Dup)
        .emit(OpCode::Size);
    let vm = run_vm(&b);
    assert_eq!(vm.eval_stack().peek(1).unwrap().as_bytes().unwrap().as_slice(), b"aaabbb");
    assert_eq!(top(&vm).as_int64().unwrap(), 6);
}

#[test]
fn size_of_integer_uses_byte_form() {
    assert_eq!(run_ops(&[1000], &[OpCode::Size]), vec![2]);
    assert_eq!(run_ops(&[0], &[OpCode::Size]), vec![0]);
}

// ==================== Bitwise and arithmetic ====================

#[test]
fn integer_ops() {
    let cases: &[(&[i64], OpCode, i64)] = &[
        (&[2], OpCode::Invert, -3),
        (&[1, 2], OpCode::And, 0),
        (&[1, 2], OpCode::Or, 3),
        (&[1, 2], OpCode::Xor, 3),
        (&[5], OpCode::Inc, 6),
        (&[5], OpCode::Dec, 4),
        (&[-9], OpCode::Sign, -1),
        (&[0], OpCode::Sign, 0),
        (&[9], OpCode::Negate, -9),
        (&[-9], OpCode::Abs, 9),
        (&[2], OpCode::Nz, 1),
        (&[0], OpCode::Nz, 0),
        (&[1, 2], OpCode::Add, 3),
        (&[1, 2], OpCode::Sub, -1),
        (&[6, 7], OpCode::Mul, 42),
        (&[103, 2], OpCode::Div, 51),
        (&[-7, 2], OpCode::Div, -3),
        (&[1, 2], OpCode::Mod, 1),
        (&[-7, 2], OpCode::Mod, -1),
        (&[1, 3], OpCode::Shl, 8),
        (&[16, 2], OpCode::Shr, 4),
        (&[-16, 2], OpCode::Shr, -4),
        (&[3, 9], OpCode::Min, 3),
        (&[3, 9], OpCode::Max, 9),
    ];
    for (input, op, expected) in cases {
        assert_eq!(
            run_ops(input, &[*op]),
            vec![*expected],
            "{} {:?}",
            op.mnemonic(),
            input
        );
    }
}

#[test]
fn nz_keeps_lower_items() {
    assert_eq!(run_ops(&[1, 2], &[OpCode::Nz]), vec![1, 1]);
}

#[test]
fn division_by_zero_is_invalid_value() {
    assert!(matches!(
        ops_err(&[1, 0], &[OpCode::Div]),
        VMError::InvalidValue { .. }
    ));
    assert!(matches!(
        ops_err(&[1, 0], &[OpCode::Mod]),
        VMError::InvalidValue { .. }
    ));
}

#[test]
fn add_promotes_past_i64() {
    let expected: BigInt = BigInt::from(i64::MAX) * 2;
    let mut b = ScriptBuilder::new();
    b.emit_push_int(i64::MAX)
        .emit_push_int(i64::MAX)
        .emit(OpCode::Add)
        .emit(OpCode::Dup)
        .emit_push_integer(&IntValue::from_bigint(expected.clone()).unwrap())
        .emit(OpCode::NumEqual);
    let vm = run_vm(&b);
    assert!(top(&vm).as_bool().unwrap());
    match vm.eval_stack().peek(1).unwrap() {
        StackItem::BigInteger(v) => assert_eq!(*v, expected),
        other => panic!("expected BigInteger, got {other:?}"),
    }
}

#[test]
fn result_past_256_bits_faults() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1).emit_push_int(256).emit(OpCode::Shl);
    assert!(matches!(run_expect_err(&b), VMError::InvalidValue { .. }));

    let mut b = ScriptBuilder::new();
    b.emit_push_int(1).emit_push_int(255).emit(OpCode::Shl);
    let vm = run_vm(&b);
    assert!(matches!(top(&vm), StackItem::BigInteger(_)));
}

#[test]
fn bytes_are_read_as_integers() {
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(&[0xE8, 0x03]).emit_push_int(1).emit(OpCode::Add);
    assert_eq!(stack_ints(&run_vm(&b)), vec![1001]);
}

#[test]
fn equal_compares_byte_forms() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1).emit_push_bytes(&[1]).emit(OpCode::Equal);
    assert!(top(&run_vm(&b)).as_bool().unwrap());

    let mut b = ScriptBuilder::new();
    b.emit_push_int(1).emit_push_bytes(&[1, 0]).emit(OpCode::Equal);
    assert!(!top(&run_vm(&b)).as_bool().unwrap());
}

// ==================== Comparison ====================

#[test]
fn comparison_ops() {
    let cases: &[(&[i64], OpCode, bool)] = &[
        (&[2, 2], OpCode::NumEqual, true),
        (&[2, 3], OpCode::NumNotEqual, true),
        (&[2, 3], OpCode::Lt, true),
        (&[3, 2], OpCode::Gt, true),
        (&[3, 3], OpCode::Lte, true),
        (&[2, 3], OpCode::Gte, false),
        (&[1, 0], OpCode::BoolAnd, false),
        (&[1, 0], OpCode::BoolOr, true),
        (&[0], OpCode::Not, true),
        (&[8888, 9999, 10000], OpCode::Within, false),
        (&[5, 1, 10], OpCode::Within, true),
        (&[10, 1, 10], OpCode::Within, false),
        (&[1, 1, 10], OpCode::Within, true),
    ];
    for (input, op, expected) in cases {
        let mut b = ScriptBuilder::new();
        for v in *input {
            b.emit_push_int(*v);
        }
        b.emit(*op);
        let vm = run_vm(&b);
        assert_eq!(vm.eval_stack().len(), 1);
        assert_eq!(
            top(&vm).as_bool().unwrap(),
            *expected,
            "{} {:?}",
            op.mnemonic(),
            input
        );
    }
}

#[test]
fn not_on_array_is_type_mismatch() {
    assert_eq!(
        ops_err(&[0], &[OpCode::NewArray, OpCode::Not]),
        VMError::TypeMismatch {
            expected: "Boolean",
            actual: "Array"
        }
    );
}

// ==================== Crypto ====================

fn hash_of(data: &[u8], op: OpCode) -> Vec<u8> {
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(data).emit(op);
    top(&run_vm(&b)).as_bytes().unwrap().to_vec()
}

#[test]
fn hash_opcodes() {
    assert_eq!(hash_of(b"hello", OpCode::Sha1), hashes::sha1(b"hello").to_vec());
    assert_eq!(hash_of(b"hello", OpCode::Sha256), hashes::sha256(b"hello").to_vec());
    assert_eq!(
        hash_of(b"hello", OpCode::Hash160),
        hashes::hash160(b"hello").to_vec()
    );
    assert_eq!(
        hash_of(b"hello", OpCode::Hash256),
        hashes::hash256(b"hello").to_vec()
    );
}

#[test]
fn hash160_is_ripemd_of_sha256() {
    use ripemd::{Digest, Ripemd160};
    let expected = Ripemd160::digest(hashes::sha256(b"neo"));
    assert_eq!(hash_of(b"neo", OpCode::Hash160), expected.to_vec());
}

fn verify_script(public_key: &[u8], signature: &[u8], message: &[u8]) -> ScriptBuilder {
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(public_key)
        .emit_push_bytes(signature)
        .emit_push_bytes(message)
        .emit(OpCode::Verify);
    b
}

#[test]
fn verify_valid_and_invalid_signatures() {
    let key = PrivateKey::new();
    let public = key.public_key().to_bytes();
    let sig = key.sign(b"payload");

    let vm = run_vm(&verify_script(&public, &sig, b"payload"));
    assert!(top(&vm).as_bool().unwrap());
    assert_eq!(vm.eval_stack().len(), 1);

    let vm = run_vm(&verify_script(&public, &sig, b"tampered"));
    assert!(!top(&vm).as_bool().unwrap());

    let vm = run_vm(&verify_script(&public, b"short", b"payload"));
    assert!(!top(&vm).as_bool().unwrap());

    let long = [sig.as_slice(), &[0u8; 8]].concat();
    let vm = run_vm(&verify_script(&public, &long, b"payload"));
    assert!(!top(&vm).as_bool().unwrap());
}

#[test]
fn verify_with_malformed_key_faults() {
    assert_eq!(
        run_expect_err(&verify_script(b"nope", &[0; 64], b"payload")),
        VMError::InvalidValue {
            reason: "malformed public key"
        }
    );
}

// ==================== Compound types ====================

#[test]
fn pack_then_unpack_restores_order() {
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(b"a")
        .emit_push_bytes(b"b")
        .emit_push_bytes(b"c")
        .emit_push_int(3)
        .emit(OpCode::Pack);
    let packed = run_vm(&b);
    let array = top(&packed).as_array().unwrap();
    let elements: Vec<Vec<u8>> = array
        .to_vec()
        .iter()
        .map(|i| i.as_bytes().unwrap().to_vec())
        .collect();
    assert_eq!(elements, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    b.emit(OpCode::Unpack);
    let vm = run_vm(&b);
    assert_eq!(
        stack_bytes(&vm),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), vec![3]]
    );
}

#[test]
fn pack_more_than_stack_underflows() {
    assert_eq!(ops_err(&[1, 5], &[OpCode::Pack]), VMError::StackUnderflow);
    assert!(matches!(
        ops_err(&[-1], &[OpCode::Pack]),
        VMError::InvalidValue { .. }
    ));
}

#[test]
fn array_size() {
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(b"12345").emit(OpCode::ArraySize);
    assert_eq!(stack_ints(&run_vm(&b)), vec![5]);
    assert_eq!(run_ops(&[3], &[OpCode::NewArray, OpCode::ArraySize]), vec![3]);
    assert_eq!(run_ops(&[2], &[OpCode::NewStruct, OpCode::ArraySize]), vec![2]);
    assert_eq!(run_ops(&[], &[OpCode::NewMap, OpCode::ArraySize]), vec![0]);
}

#[test]
fn new_array_fills_with_zero() {
    let vm = {
        let mut b = ScriptBuilder::new();
        b.emit_push_int(2).emit(OpCode::NewArray);
        run_vm(&b)
    };
    let items = top(&vm).as_array().unwrap().to_vec();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.as_int64().unwrap() == 0));
}

#[test]
fn new_array_count_is_bounded() {
    assert!(matches!(
        ops_err(&[MAX_ARRAY_SIZE as i64 + 1], &[OpCode::NewArray]),
        VMError::SizeLimitExceeded { .. }
    ));
    assert!(matches!(
        ops_err(&[-1], &[OpCode::NewStruct]),
        VMError::InvalidValue { .. }
    ));
}

#[test]
fn array_setitem_is_visible_through_alias() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(2)
        .emit(OpCode::NewArray)
        .emit(OpCode::Dup)
        .emit_push_int(0)
        .emit_push_int(5)
        .emit(OpCode::SetItem)
        .emit_push_int(0)
        .emit(OpCode::PickItem);
    assert_eq!(stack_ints(&run_vm(&b)), vec![5]);
}

#[test]
fn struct_setitem_is_visible_through_stack_copies() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(2)
        .emit(OpCode::NewStruct)
        .emit(OpCode::ToAltStack)
        .emit(OpCode::DupFromAltStack)
        .emit_push_int(0)
        .emit_push_int(5)
        .emit(OpCode::SetItem)
        .emit(OpCode::FromAltStack)
        .emit_push_int(0)
        .emit(OpCode::PickItem);
    assert_eq!(stack_ints(&run_vm(&b)), vec![5]);
}

#[test]
fn struct_inside_array_is_writable() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1)
        .emit(OpCode::NewStruct)
        .emit_push_int(1)
        .emit(OpCode::Pack)
        .emit(OpCode::Dup)
        .emit_push_int(0)
        .emit(OpCode::PickItem)
        .emit_push_int(0)
        .emit_push_int(7)
        .emit(OpCode::SetItem)
        .emit_push_int(0)
        .emit(OpCode::PickItem)
        .emit_push_int(0)
        .emit(OpCode::PickItem);
    assert_eq!(stack_ints(&run_vm(&b)), vec![7]);
}

#[test]
fn struct_stored_into_container_is_a_copy() {
    // Store the struct kept on the alt stack, then write 9 into the original.
    let mutate_original = |b: &mut ScriptBuilder| {
        b.emit(OpCode::DupFromAltStack)
            .emit_push_int(0)
            .emit_push_int(9)
            .emit(OpCode::SetItem)
            .emit_push_int(0)
            .emit(OpCode::PickItem)
            .emit_push_int(0)
            .emit(OpCode::PickItem)
            .emit(OpCode::FromAltStack)
            .emit_push_int(0)
            .emit(OpCode::PickItem);
    };

    let mut b = ScriptBuilder::new();
    b.emit_push_int(1)
        .emit(OpCode::NewStruct)
        .emit(OpCode::ToAltStack)
        .emit_push_int(1)
        .emit(OpCode::NewArray)
        .emit(OpCode::Dup)
        .emit_push_int(0)
        .emit(OpCode::DupFromAltStack)
        .emit(OpCode::SetItem);
    mutate_original(&mut b);
    assert_eq!(stack_ints(&run_vm(&b)), vec![0, 9]);

    let mut b = ScriptBuilder::new();
    b.emit_push_int(1)
        .emit(OpCode::NewStruct)
        .emit(OpCode::ToAltStack)
        .emit_push_int(0)
        .emit(OpCode::NewArray)
        .emit(OpCode::Dup)
        .emit(OpCode::DupFromAltStack)
        .emit(OpCode::Append);
    mutate_original(&mut b);
    assert_eq!(stack_ints(&run_vm(&b)), vec![0, 9]);
}

#[test]
fn struct_picked_twice_compares_equal() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1)
        .emit(OpCode::NewStruct)
        .emit_push_int(1)
        .emit(OpCode::Pack)
        .emit(OpCode::Dup)
        .emit_push_int(0)
        .emit(OpCode::PickItem)
        .emit(OpCode::Swap)
        .emit_push_int(0)
        .emit(OpCode::PickItem)
        .emit(OpCode::Equal);
    assert!(top(&run_vm(&b)).as_bool().unwrap());
}

#[test]
fn equal_on_compounds() {
    // Structs compare by content, arrays by identity.
    assert_eq!(
        run_ops(&[2], &[OpCode::NewStruct, OpCode::Push2, OpCode::NewStruct, OpCode::Equal]),
        vec![1]
    );
    assert_eq!(
        run_ops(&[2], &[OpCode::NewArray, OpCode::Push2, OpCode::NewArray, OpCode::Equal]),
        vec![0]
    );
    assert_eq!(
        run_ops(&[2], &[OpCode::NewArray, OpCode::Dup, OpCode::Equal]),
        vec![1]
    );
}

#[test]
fn pickitem_out_of_range() {
    assert_eq!(
        ops_err(&[2], &[OpCode::NewArray, OpCode::Push2, OpCode::PickItem]),
        VMError::IndexOutOfBound { index: 2, len: 2 }
    );
    assert_eq!(
        ops_err(&[2], &[OpCode::NewStruct, OpCode::PushM1, OpCode::PickItem]),
        VMError::IndexOutOfBound { index: -1, len: 2 }
    );
}

#[test]
fn pickitem_on_primitive_is_type_mismatch() {
    assert!(matches!(
        ops_err(&[7, 0], &[OpCode::PickItem]),
        VMError::TypeMismatch {
            expected: "Array, Struct or Map",
            actual: "Integer"
        }
    ));
}

fn map_script() -> ScriptBuilder {
    // Leaves a map {"b": 2, "a": 1} on the stack.
    let mut b = ScriptBuilder::new();
    b.emit(OpCode::NewMap)
        .emit(OpCode::Dup)
        .emit_push_bytes(b"b")
        .emit_push_int(2)
        .emit(OpCode::SetItem)
        .emit(OpCode::Dup)
        .emit_push_bytes(b"a")
        .emit_push_int(1)
        .emit(OpCode::SetItem);
    b
}

#[test]
fn map_setitem_and_pickitem() {
    let mut b = map_script();
    b.emit_push_bytes(b"b").emit(OpCode::PickItem);
    assert_eq!(stack_ints(&run_vm(&b)), vec![2]);
}

#[test]
fn map_keys_match_across_primitive_types() {
    let mut b = ScriptBuilder::new();
    b.emit(OpCode::NewMap)
        .emit(OpCode::Dup)
        .emit_push_int(1)
        .emit_push_int(9)
        .emit(OpCode::SetItem)
        .emit_push_bytes(&[1])
        .emit(OpCode::PickItem);
    assert_eq!(stack_ints(&run_vm(&b)), vec![9]);
}

#[test]
fn map_missing_key_faults() {
    let mut b = map_script();
    b.emit_push_bytes(b"zzz").emit(OpCode::PickItem);
    assert_eq!(run_expect_err(&b), VMError::MapKeyNotFound);
}

#[test]
fn map_haskey_and_remove() {
    let mut b = map_script();
    b.emit(OpCode::Dup)
        .emit_push_bytes(b"a")
        .emit(OpCode::HasKey)
        .emit(OpCode::Swap)
        .emit(OpCode::Dup)
        .emit_push_bytes(b"a")
        .emit(OpCode::Remove)
        .emit_push_bytes(b"a")
        .emit(OpCode::HasKey);
    assert_eq!(stack_ints(&run_vm(&b)), vec![1, 0]);
}

#[test]
fn haskey_requires_map() {
    assert!(matches!(
        ops_err(&[1], &[OpCode::NewArray, OpCode::Push0, OpCode::HasKey]),
        VMError::TypeMismatch { expected: "Map", .. }
    ));
}

#[test]
fn keys_and_values_are_sorted() {
    let mut b = map_script();
    b.emit(OpCode::Dup).emit(OpCode::Keys).emit(OpCode::Swap).emit(OpCode::Values);
    let vm = run_vm(&b);
    let keys: Vec<Vec<u8>> = vm
        .eval_stack()
        .peek(1)
        .unwrap()
        .as_array()
        .unwrap()
        .to_vec()
        .iter()
        .map(|k| k.as_bytes().unwrap().to_vec())
        .collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    let values: Vec<i64> = top(&vm)
        .as_array()
        .unwrap()
        .to_vec()
        .iter()
        .map(|v| v.as_int64().unwrap())
        .collect();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn append_and_reverse() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(0)
        .emit(OpCode::NewArray)
        .emit(OpCode::Dup)
        .emit_push_int(1)
        .emit(OpCode::Append)
        .emit(OpCode::Dup)
        .emit_push_int(2)
        .emit(OpCode::Append)
        .emit(OpCode::Dup)
        .emit(OpCode::Reverse)
        .emit(OpCode::Unpack);
    assert_eq!(stack_ints(&run_vm(&b)), vec![2, 1, 2]);
}

#[test]
fn append_to_struct_is_type_mismatch() {
    assert!(matches!(
        ops_err(&[0], &[OpCode::NewStruct, OpCode::Push1, OpCode::Append]),
        VMError::TypeMismatch { expected: "Array", .. }
    ));
}

#[test]
fn array_remove_is_zero_based() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(7)
        .emit_push_int(8)
        .emit_push_int(9)
        .emit_push_int(3)
        .emit(OpCode::Pack)
        .emit(OpCode::Dup)
        .emit_push_int(0)
        .emit(OpCode::Remove)
        .emit(OpCode::Unpack);
    assert_eq!(stack_ints(&run_vm(&b)), vec![8, 9, 2]);

    assert_eq!(
        ops_err(&[1], &[OpCode::NewArray, OpCode::Push1, OpCode::Remove]),
        VMError::IndexOutOfBound { index: 1, len: 1 }
    );
}

// ==================== Gas ====================

#[test]
fn gas_is_charged_per_opcode() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(1)
        .emit_push_int(2)
        .emit(OpCode::Add)
        .emit(OpCode::Sha256)
        .emit_push_bytes(b"x");
    let vm = run_vm(&b);
    assert_eq!(vm.gas_used(), 1 + 1 + 1 + 10 + PUSH_BYTES_GAS);
    assert_eq!(vm.gas_profile().get(GasCategory::Crypto), 10);
    assert_eq!(vm.gas_profile().total(), vm.gas_used());
}

#[test]
fn gas_limit_stops_infinite_loop() {
    let mut b = ScriptBuilder::new();
    b.emit_jump(OpCode::Jmp, 0).unwrap();
    let mut vm = VM::with_config(b.into_bytes(), ExecutionConfig { gas_limit: 100 });
    assert_eq!(
        vm.execute().unwrap_err(),
        VMError::OutOfGas {
            used: 101,
            limit: 100
        }
    );
    assert_eq!(vm.gas_used(), 100);
    assert_eq!(vm.state(), VMState::Fault);
}

// ==================== Host ====================

#[test]
fn unknown_syscall_faults() {
    let mut b = ScriptBuilder::new();
    b.emit_syscall("Runtime.Log");
    assert_eq!(
        run_expect_err(&b),
        VMError::UnknownSyscall {
            name: "Runtime.Log".to_string()
        }
    );
}

struct EchoHost {
    calls: Vec<String>,
}

impl Host for EchoHost {
    fn syscall(&mut self, name: &str, vm: &mut VM) -> Result<(), VMError> {
        self.calls.push(name.to_string());
        let value = vm.pop_value()?.as_int()?;
        vm.push_value(value.add(&IntValue::from(100))?.into())
    }
}

#[test]
fn custom_host_uses_stack_for_arguments() {
    let mut b = ScriptBuilder::new();
    b.emit_push_int(5).emit_syscall("Echo.AddHundred");
    let mut host = EchoHost { calls: vec![] };
    let mut vm = VM::new(b.into_bytes());
    vm.execute_with(&mut host).unwrap();
    assert_eq!(stack_ints(&vm), vec![105]);
    assert_eq!(host.calls, vec!["Echo.AddHundred".to_string()]);
}

#[test]
fn storage_syscalls_write_through_overlay() {
    let mut base = MemoryState::with_data(vec![(b"k".to_vec(), b"v".to_vec())]);

    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(b"v2")
        .emit_push_bytes(b"k2")
        .emit_syscall("Storage.Put")
        .emit_push_bytes(b"k")
        .emit_syscall("Storage.Get")
        .emit_push_bytes(b"k")
        .emit_syscall("Storage.Delete")
        .emit_push_bytes(b"k")
        .emit_syscall("Storage.Get");

    let writes = {
        let mut overlay = OverlayState::new(&base);
        let mut vm = VM::new(b.into_bytes());
        vm.execute_with(&mut StorageHost::new(&mut overlay)).unwrap();
        assert_eq!(stack_bytes(&vm), vec![b"v".to_vec(), vec![]]);
        assert_eq!(
            vm.gas_profile().get(GasCategory::StateRead),
            2 * STORAGE_READ_GAS
        );
        overlay.into_writes()
    };
    base.apply(writes);
    assert_eq!(base.get(b"k2"), Some(b"v2".to_vec()));
    assert_eq!(base.get(b"k"), None);
}

#[test]
fn faulted_storage_run_is_discarded() {
    let base = MemoryState::new();
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(b"v")
        .emit_push_bytes(b"k")
        .emit_syscall("Storage.Put")
        .emit(OpCode::Throw);

    let mut overlay = OverlayState::new(&base);
    let mut vm = VM::new(b.into_bytes());
    assert!(vm.execute_with(&mut StorageHost::new(&mut overlay)).is_err());
    assert_eq!(overlay.pending(), 1);
    drop(overlay);
    assert!(base.is_empty());
}

#[test]
fn storage_key_size_is_bounded() {
    let mut state = MemoryState::new();
    let mut b = ScriptBuilder::new();
    b.emit_push_bytes(&vec![0; crate::virtual_machine::host::MAX_STORAGE_KEY_SIZE + 1])
        .emit_syscall("Storage.Get");
    let mut vm = VM::new(b.into_bytes());
    assert!(matches!(
        vm.execute_with(&mut StorageHost::new(&mut state)),
        Err(VMError::SizeLimitExceeded { .. })
    ));
}
