#[cfg(test)]
mod tests {
    use crate::virtual_machine::isa::{OpCode, PUSH_BYTES_GAS, PUSHBYTES1, PUSHBYTES75};

    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    const EXPECTED_ISA_HASH: u64 = 8391521574471949725;

    fn fnv1a64(mut h: u64, bytes: &[u8]) -> u64 {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    macro_rules! hash_isa {
        (
            $( $(#[$doc:meta])* $name:ident = $opcode:literal, $mnemonic:literal => [ $( $kind:ident )? ], $gas:expr ),* $(,)?
        ) => {{
            let mut h = FNV_OFFSET;
            $(
                h = fnv1a64(h, stringify!($name).as_bytes());
                h = fnv1a64(h, &[OpCode::$name as u8]);
                h = fnv1a64(h, $mnemonic.as_bytes());
                $( h = fnv1a64(h, stringify!($kind).as_bytes()); )?
                h = fnv1a64(h, &OpCode::$name.base_gas().to_le_bytes());
            )*
            h = fnv1a64(h, b"PUSHBYTES");
            h = fnv1a64(h, &[PUSHBYTES1, PUSHBYTES75]);
            h = fnv1a64(h, &PUSH_BYTES_GAS.to_le_bytes());
            h
        }};
    }

    fn current_isa_hash() -> u64 {
        crate::for_each_opcode!(hash_isa)
    }

    #[test]
    #[ignore]
    fn print_isa_hash() {
        println!("ISA_HASH={}", current_isa_hash());
    }

    #[test]
    fn isa_hash_unchanged() {
        assert_eq!(current_isa_hash(), EXPECTED_ISA_HASH);
    }
}
