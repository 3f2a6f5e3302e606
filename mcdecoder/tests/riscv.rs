use mcdecoder::{McDecoder, Options};
use mcdecoder_test::{
    isa,
    test::{self, Runner, Test},
};

struct Riscv;

impl Runner for Riscv {
    fn create(&mut self, test: &Test) -> McDecoder {
        let mut opts = Options::default();

        for (name, state) in test::parse_flags(test.comment) {
            match name {
                "split" => opts = opts.split_wildcards(state),
                "threads" => opts = opts.threads(if state { 4 } else { 1 }),
                _ => panic!("unexpected flag {name}"),
            }
        }

        McDecoder::builder()
            .options(opts)
            .functions(isa::functions())
            .build(&isa::riscv_c())
            .unwrap()
    }
}

macro_rules! test {
    ($name:ident, $file:expr) => {
        #[test]
        fn $name() -> Result<(), String> {
            Riscv.run($file, include_str!($file))
        }
    };
}

test!(rvc, "rvc.test");
