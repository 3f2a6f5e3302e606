//! Compiled match conditions.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    error::{ConditionError, ConditionErrorKind},
    insn::InstructionDecoder,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    pub fn apply(&self, lhs: u64, rhs: u64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Field {
        name: String,
        element_index: Option<u32>,
    },
    Immediate(u64),
    Function {
        name: String,
        argument: Box<Operand>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Equality {
        subject: Operand,
        op: CompareOp,
        object: Operand,
    },
    InSet {
        subject: Operand,
        values: Vec<u64>,
    },
    /// Inclusive range.
    InRange {
        subject: Operand,
        start: u64,
        end: u64,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

/// Data available to condition functions.
pub struct EvalContext<'a> {
    pub instruction: &'a InstructionDecoder,
    pub code: u64,
}

type Function = dyn Fn(u64, &EvalContext) -> u64 + Send + Sync;

/// Registry of functions callable from conditions.
///
/// ```
/// use mcdecoder_core::condition::Functions;
///
/// let functions = Functions::new()
///     .register("setbit_count", |value, _| value.count_ones() as u64);
/// assert!(functions.contains("setbit_count"));
/// ```
#[derive(Clone, Default)]
pub struct Functions {
    map: HashMap<String, Arc<Function>>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(u64, &EvalContext) -> u64 + Send + Sync + 'static,
    {
        self.map.insert(name.to_owned(), Arc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    fn get(&self, insn: &InstructionDecoder, name: &str) -> Result<&Function, ConditionError> {
        self.map.get(name).map(|f| f.as_ref()).ok_or_else(|| {
            ConditionError::new(
                &insn.name,
                ConditionErrorKind::UndefinedFunction(name.to_owned()),
            )
        })
    }
}

impl fmt::Debug for Functions {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<_> = self.map.keys().collect();
        names.sort();
        fmt.debug_set().entries(names).finish()
    }
}

impl Operand {
    fn validate(&self, insn: &InstructionDecoder) -> Result<(), ConditionError> {
        let error = |kind| Err(ConditionError::new(&insn.name, kind));
        match self {
            Self::Field {
                name,
                element_index,
            } => {
                let Some(field) = insn.field(name) else {
                    return error(ConditionErrorKind::UndefinedField(name.clone()));
                };
                if let Some(index) = *element_index {
                    let count = insn.length_of_encoding_elements();
                    if index >= count {
                        return error(ConditionErrorKind::ElementIndex {
                            field: name.clone(),
                            index,
                            count,
                        });
                    }
                    if !field.has_element(insn.form, index) {
                        return error(ConditionErrorKind::EmptyElement {
                            field: name.clone(),
                            index,
                        });
                    }
                }
                Ok(())
            }
            Self::Immediate(_) => Ok(()),
            Self::Function { argument, .. } => argument.validate(insn),
        }
    }

    fn value(
        &self,
        insn: &InstructionDecoder,
        code: u64,
        functions: &Functions,
    ) -> Result<u64, ConditionError> {
        match self {
            Self::Field {
                name,
                element_index,
            } => {
                let Some(field) = insn.field(name) else {
                    let kind = ConditionErrorKind::UndefinedField(name.clone());
                    return Err(ConditionError::new(&insn.name, kind));
                };
                Ok(match element_index {
                    Some(index) => field.decode_element(code, insn.form, *index),
                    None => field.decode(code),
                })
            }
            Self::Immediate(value) => Ok(*value),
            Self::Function { name, argument } => {
                let f = functions.get(insn, name)?;
                let argument = argument.value(insn, code, functions)?;
                let ctx = EvalContext {
                    instruction: insn,
                    code,
                };
                Ok(f(argument, &ctx))
            }
        }
    }

    fn values(
        &self,
        insn: &InstructionDecoder,
        codes: &[u64],
        functions: &Functions,
    ) -> Result<Vec<u64>, ConditionError> {
        match self {
            Self::Immediate(value) => Ok(vec![*value; codes.len()]),
            Self::Function { name, argument } => {
                let f = functions.get(insn, name)?;
                let arguments = argument.values(insn, codes, functions)?;
                let values = codes
                    .iter()
                    .zip(arguments)
                    .map(|(&code, argument)| {
                        let ctx = EvalContext {
                            instruction: insn,
                            code,
                        };
                        f(argument, &ctx)
                    })
                    .collect();
                Ok(values)
            }
            Self::Field { .. } => codes
                .iter()
                .map(|&code| self.value(insn, code, functions))
                .collect(),
        }
    }
}

impl Condition {
    /// Checks that all referenced fields and element indices exist.
    pub fn validate(&self, insn: &InstructionDecoder) -> Result<(), ConditionError> {
        match self {
            Self::Equality {
                subject, object, ..
            } => {
                subject.validate(insn)?;
                object.validate(insn)
            }
            Self::InSet { subject, .. } | Self::InRange { subject, .. } => subject.validate(insn),
            Self::And(list) | Self::Or(list) => list.iter().try_for_each(|c| c.validate(insn)),
        }
    }

    /// Evaluates the condition for a single code.
    ///
    /// `and` and `or` stop at the first child which decides the result.
    pub fn evaluate(
        &self,
        insn: &InstructionDecoder,
        code: u64,
        functions: &Functions,
    ) -> Result<bool, ConditionError> {
        let value = |operand: &Operand| operand.value(insn, code, functions);
        match self {
            Self::Equality {
                subject,
                op,
                object,
            } => Ok(op.apply(value(subject)?, value(object)?)),
            Self::InSet { subject, values } => Ok(values.contains(&value(subject)?)),
            Self::InRange {
                subject,
                start,
                end,
            } => Ok((*start..=*end).contains(&value(subject)?)),
            Self::And(list) => {
                for cond in list {
                    if !cond.evaluate(insn, code, functions)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(list) => {
                for cond in list {
                    if cond.evaluate(insn, code, functions)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Evaluates the condition for many codes at once.
    ///
    /// Children of `and` and `or` are evaluated only for lanes which are not
    /// decided yet, so every lane sees exactly the evaluations the scalar
    /// [`evaluate`] would perform.
    ///
    /// [`evaluate`]: Self::evaluate
    pub fn evaluate_lanes(
        &self,
        insn: &InstructionDecoder,
        codes: &[u64],
        functions: &Functions,
    ) -> Result<Vec<bool>, ConditionError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let values = |operand: &Operand| operand.values(insn, codes, functions);
        match self {
            Self::Equality {
                subject,
                op,
                object,
            } => {
                let lhs = values(subject)?;
                let rhs = values(object)?;
                Ok(lhs.iter().zip(rhs).map(|(&l, r)| op.apply(l, r)).collect())
            }
            Self::InSet {
                subject,
                values: set,
            } => Ok(values(subject)?.iter().map(|v| set.contains(v)).collect()),
            Self::InRange {
                subject,
                start,
                end,
            } => Ok(values(subject)?
                .iter()
                .map(|v| (*start..=*end).contains(v))
                .collect()),
            Self::And(list) => evaluate_logical(list, true, insn, codes, functions),
            Self::Or(list) => evaluate_logical(list, false, insn, codes, functions),
        }
    }
}

/// Lane-masked `and`/`or`: a lane is decided once a child yields `!identity`.
fn evaluate_logical(
    list: &[Condition],
    identity: bool,
    insn: &InstructionDecoder,
    codes: &[u64],
    functions: &Functions,
) -> Result<Vec<bool>, ConditionError> {
    let mut result = vec![identity; codes.len()];
    let mut live: Vec<usize> = (0..codes.len()).collect();
    for cond in list {
        if live.is_empty() {
            break;
        }
        let live_codes: Vec<u64> = live.iter().map(|&i| codes[i]).collect();
        let lanes = cond.evaluate_lanes(insn, &live_codes, functions)?;
        let mut next = Vec::with_capacity(live.len());
        for (&i, value) in live.iter().zip(lanes) {
            if value == identity {
                next.push(i);
            } else {
                result[i] = value;
            }
        }
        live = next;
    }
    Ok(result)
}

impl fmt::Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Field {
                name,
                element_index: None,
            } => fmt.write_str(name),
            Self::Field {
                name,
                element_index: Some(index),
            } => write!(fmt, "{name}[{index}]"),
            Self::Immediate(value) => write!(fmt, "{value}"),
            Self::Function { name, argument } => write!(fmt, "{name}({argument})"),
        }
    }
}

fn fmt_list(fmt: &mut fmt::Formatter, list: &[Condition], sep: &str) -> fmt::Result {
    for (i, cond) in list.iter().enumerate() {
        if i != 0 {
            write!(fmt, " {sep} ")?;
        }
        match cond {
            Condition::And(..) | Condition::Or(..) => write!(fmt, "({cond})")?,
            _ => write!(fmt, "{cond}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Condition {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Equality {
                subject,
                op,
                object,
            } => write!(fmt, "{subject} {} {object}", op.as_str()),
            Self::InSet { subject, values } => {
                write!(fmt, "{subject} in [")?;
                for (i, value) in values.iter().enumerate() {
                    if i != 0 {
                        fmt.write_str(", ")?;
                    }
                    write!(fmt, "{value}")?;
                }
                fmt.write_str("]")
            }
            Self::InRange {
                subject,
                start,
                end,
            } => write!(fmt, "{subject} in_range {start}-{end}"),
            Self::And(conds) => fmt_list(fmt, conds, "and"),
            Self::Or(conds) => fmt_list(fmt, conds, "or"),
        }
    }
}
