use crate::{
    batch,
    bytes::{self, ByteOrder},
    condition::Functions,
    desc::McDescription,
    error::{DecodeAmbiguityError, Error},
    extras::Value,
    insn::{FieldValues, Form, InstructionDecoder},
    tree::{DecisionTree, TreeOptions},
    Options,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Machine {
    pub byteorder: ByteOrder,
    pub extras: Option<Value>,
}

/// An instruction decoded from bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded<'a> {
    pub instruction: &'a InstructionDecoder,
    /// Code assembled from the bytes for the instruction form.
    pub code: u64,
    pub fields: FieldValues<'a>,
}

type Hook = Box<dyn FnMut(&mut InstructionDecoder)>;

#[derive(Default)]
pub struct Builder {
    opts: Options,
    functions: Functions,
    hook: Option<Hook>,
}

impl Builder {
    pub fn options(mut self, opts: Options) -> Self {
        self.opts = opts;
        self
    }

    pub fn functions(mut self, functions: Functions) -> Self {
        self.functions = functions;
        self
    }

    /// Sets a hook called for every compiled instruction before decision
    /// trees are built.
    pub fn process_instruction<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut InstructionDecoder) + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn build(mut self, desc: &McDescription) -> Result<McDecoder, Error> {
        let mut instructions = Vec::with_capacity(desc.instructions.len());
        for insn in &desc.instructions {
            let mut insn = InstructionDecoder::compile(insn)?;
            if let Some(hook) = self.hook.as_mut() {
                hook(&mut insn);
            }
            insn.check_mask()?;
            instructions.push(insn);
        }

        let mut forms: Vec<(Form, Vec<usize>)> = Vec::new();
        for (i, insn) in instructions.iter().enumerate() {
            match forms.iter().position(|(form, _)| *form == insn.form) {
                Some(f) => forms[f].1.push(i),
                None => forms.push((insn.form, vec![i])),
            }
        }
        forms.sort_by_key(|(form, _)| *form);

        let tree_opts = TreeOptions {
            split_wildcards: self.opts.split_wildcards,
        };
        let code_bit_len = forms.iter().map(|(form, _)| form.bit_len()).max().unwrap_or(0);
        let decision_trees = forms
            .into_iter()
            .map(|(form, list)| DecisionTree::build(form, &instructions, list, &tree_opts))
            .collect();

        let namespace = desc.decoder.as_ref().and_then(|d| d.namespace.clone());
        let namespace_prefix = namespace
            .as_ref()
            .map_or_else(String::new, |ns| format!("{ns}_"));

        debug!(
            "decoder model {}: {} instruction(s)",
            namespace.as_deref().unwrap_or("<none>"),
            instructions.len()
        );

        Ok(McDecoder {
            namespace,
            namespace_prefix,
            machine: Machine {
                byteorder: desc.machine.byteorder,
                extras: desc.machine.extras.clone(),
            },
            instructions,
            decision_trees,
            code_bit_len,
            extras: desc.extras.clone(),
            opts: self.opts,
            functions: self.functions,
        })
    }
}

/// Decoder model: compiled instructions and decision trees.
#[derive(Debug)]
pub struct McDecoder {
    namespace: Option<String>,
    namespace_prefix: String,
    machine: Machine,
    instructions: Vec<InstructionDecoder>,
    decision_trees: Vec<DecisionTree>,
    code_bit_len: u32,
    extras: Option<Value>,
    opts: Options,
    functions: Functions,
}

impl McDecoder {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Builds a model with default options and no condition functions.
    pub fn new(desc: &McDescription) -> Result<Self, Error> {
        Self::builder().build(desc)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn namespace_prefix(&self) -> &str {
        &self.namespace_prefix
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn instructions(&self) -> &[InstructionDecoder] {
        &self.instructions
    }

    pub fn instruction(&self, name: &str) -> Option<&InstructionDecoder> {
        self.instructions.iter().find(|i| i.name == name)
    }

    pub fn decision_trees(&self) -> &[DecisionTree] {
        &self.decision_trees
    }

    /// Bit length of the widest instruction form, the width of the codes
    /// taken by [`decode`] and [`decode_batch`].
    ///
    /// [`decode`]: Self::decode
    /// [`decode_batch`]: Self::decode_batch
    pub fn code_bit_len(&self) -> u32 {
        self.code_bit_len
    }

    pub fn extras(&self) -> Option<&Value> {
        self.extras.as_ref()
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    /// Byte length of the shortest instruction.
    pub fn min_instruction_bytes(&self) -> usize {
        self.decision_trees
            .iter()
            .map(|t| t.form.byte_len())
            .min()
            .unwrap_or(0)
    }

    /// Returns `(instruction, form code)` pairs of all instructions whose
    /// fixed bits match, in declaration order.
    fn candidates(&self, code: u64) -> Vec<(usize, u64)> {
        let mut out = Vec::new();
        for tree in &self.decision_trees {
            let code = tree.form.align(code, self.code_bit_len);
            for i in tree.candidates(code) {
                if self.instructions[i].matches_fixed_bits(code) {
                    out.push((i, code));
                }
            }
        }
        out.sort_unstable_by_key(|&(i, _)| i);
        out
    }

    /// Returns all instructions matching the code, in declaration order.
    ///
    /// The code is [`code_bit_len`] bits wide, the first encoding element
    /// most significant. Narrower forms are matched against its leading
    /// bits.
    ///
    /// [`code_bit_len`]: Self::code_bit_len
    pub fn decode(&self, code: u64) -> Result<Vec<&InstructionDecoder>, Error> {
        let mut out = Vec::new();
        for (i, code) in self.candidates(code) {
            let insn = &self.instructions[i];
            if insn.confirm_conditions(code, &self.functions)? {
                out.push(insn);
            }
        }
        Ok(out)
    }

    /// Returns the first instruction in declaration order matching the code.
    ///
    /// Conditions of the instructions declared after the match are not
    /// evaluated.
    pub fn decode_first(&self, code: u64) -> Result<Option<&InstructionDecoder>, Error> {
        for (i, code) in self.candidates(code) {
            let insn = &self.instructions[i];
            if insn.confirm_conditions(code, &self.functions)? {
                return Ok(Some(insn));
            }
        }
        Ok(None)
    }

    /// Like [`decode`] but fails if more than one instruction matches.
    ///
    /// [`decode`]: Self::decode
    pub fn decode_unique(&self, code: u64) -> Result<Option<&InstructionDecoder>, Error> {
        let list = self.decode(code)?;
        if list.len() > 1 {
            let names = list.iter().map(|i| i.name.clone()).collect();
            return Err(DecodeAmbiguityError::new(code, names).into());
        }
        Ok(list.into_iter().next())
    }

    /// Returns the first matching instruction for every code.
    pub fn decode_batch(&self, codes: &[u64]) -> Result<Vec<Option<&InstructionDecoder>>, Error> {
        let list = batch::decode(
            &self.instructions,
            &self.functions,
            &self.opts,
            self.code_bit_len,
            codes,
        )?;
        Ok(list
            .into_iter()
            .map(|i| i.map(|i| &self.instructions[i]))
            .collect())
    }

    pub fn extract_fields<'a>(&self, code: u64, insn: &'a InstructionDecoder) -> FieldValues<'a> {
        insn.decode_fields(insn.form.align(code, self.code_bit_len))
    }

    /// Decodes the leading bytes for every instruction form.
    ///
    /// Forms longer than `bytes` are skipped.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Vec<Decoded<'_>>, Error> {
        let mut out = Vec::new();
        for tree in &self.decision_trees {
            let Some(code) = bytes::assemble(bytes, self.machine.byteorder, tree.form) else {
                continue;
            };
            for i in tree.decode(code, &self.instructions, &self.functions)? {
                let instruction = &self.instructions[i];
                out.push((
                    i,
                    Decoded {
                        instruction,
                        code,
                        fields: instruction.decode_fields(code),
                    },
                ));
            }
        }
        out.sort_by_key(|(i, _)| *i);
        Ok(out.into_iter().map(|(_, d)| d).collect())
    }
}
