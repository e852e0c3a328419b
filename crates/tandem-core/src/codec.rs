//! Flat wire encoding of patch streams.
//!
//! A stream is one heterogeneous JSON array with no length prefix:
//!
//! | op | layout |
//! |---|---|
//! | `Create` | `[0, id, type \| null, [values...]]` |
//! | `Remove` | `[1, id]` |
//! | `InsertBefore` | `[2, id, parent, before \| null]` |
//! | `UpdateValue` | `[3, id, index, value]` |
//! | `UpdateChildren` | `[4, id, count, child...]` |
//!
//! Decoding is all-or-nothing: any unknown opcode or short payload rejects the
//! whole stream.

use serde_json::Value;

use crate::error::MalformedReason;
use crate::patch::{Opcode, PatchOp};
use crate::SnapshotId;

pub fn encode(ops: &[PatchOp]) -> Vec<Value> {
    let mut out = Vec::with_capacity(ops.len() * 4);
    for op in ops {
        out.push(Value::from(op.opcode().to_wire()));
        match op {
            PatchOp::Create { id, ty, values } => {
                out.push(Value::from(*id));
                out.push(ty.clone().map(Value::String).unwrap_or(Value::Null));
                out.push(Value::Array(values.clone()));
            }
            PatchOp::Remove { id } => out.push(Value::from(*id)),
            PatchOp::InsertBefore { id, parent, before } => {
                out.push(Value::from(*id));
                out.push(Value::from(*parent));
                out.push(before.map(Value::from).unwrap_or(Value::Null));
            }
            PatchOp::UpdateValue { id, index, value } => {
                out.push(Value::from(*id));
                out.push(Value::from(*index));
                out.push(value.clone());
            }
            PatchOp::UpdateChildren { id, children } => {
                out.push(Value::from(*id));
                out.push(Value::from(children.len()));
                out.extend(children.iter().map(|c| Value::from(*c)));
            }
        }
    }
    out
}

pub fn decode(stream: &[Value]) -> Result<Vec<PatchOp>, MalformedReason> {
    let mut reader = Reader { stream, pos: 0 };
    let mut ops = Vec::new();
    while !reader.is_done() {
        let start = reader.pos;
        let opcode = reader.opcode()?;
        let op = match opcode {
            Opcode::Create => {
                let id = reader.id(opcode)?;
                let ty = match reader.next(opcode)? {
                    Value::Null => None,
                    Value::String(ty) => Some(ty.clone()),
                    _ => return Err(reader.invalid("template type or null")),
                };
                let values = match reader.next(opcode)? {
                    Value::Array(values) => values.clone(),
                    _ => return Err(reader.invalid("value array")),
                };
                PatchOp::Create { id, ty, values }
            }
            Opcode::Remove => PatchOp::Remove {
                id: reader.id(opcode)?,
            },
            Opcode::InsertBefore => {
                let id = reader.id(opcode)?;
                let parent = reader.id(opcode)?;
                let before = reader.optional_id(opcode)?;
                PatchOp::InsertBefore { id, parent, before }
            }
            Opcode::UpdateValue => {
                let id = reader.id(opcode)?;
                let index = reader.count(opcode)?;
                let value = reader.next(opcode)?.clone();
                PatchOp::UpdateValue { id, index, value }
            }
            Opcode::UpdateChildren => {
                let id = reader.id(opcode)?;
                let count = reader.count(opcode)?;
                if reader.remaining() < count {
                    return Err(MalformedReason::Truncated {
                        offset: start,
                        opcode,
                    });
                }
                let mut children = Vec::with_capacity(count);
                for _ in 0..count {
                    children.push(reader.id(opcode)?);
                }
                PatchOp::UpdateChildren { id, children }
            }
        };
        ops.push(op);
    }
    Ok(ops)
}

struct Reader<'a> {
    stream: &'a [Value],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_done(&self) -> bool {
        self.pos >= self.stream.len()
    }

    fn remaining(&self) -> usize {
        self.stream.len().saturating_sub(self.pos)
    }

    fn invalid(&self, expected: &'static str) -> MalformedReason {
        MalformedReason::InvalidOperand {
            offset: self.pos.saturating_sub(1),
            expected,
        }
    }

    fn next(&mut self, opcode: Opcode) -> Result<&'a Value, MalformedReason> {
        let value = self.stream.get(self.pos).ok_or(MalformedReason::Truncated {
            offset: self.pos,
            opcode,
        })?;
        self.pos += 1;
        Ok(value)
    }

    fn opcode(&mut self) -> Result<Opcode, MalformedReason> {
        let offset = self.pos;
        let raw = &self.stream[offset];
        self.pos += 1;
        raw.as_u64()
            .and_then(Opcode::from_wire)
            .ok_or_else(|| MalformedReason::UnknownOpcode {
                offset,
                opcode: raw.clone(),
            })
    }

    fn id(&mut self, opcode: Opcode) -> Result<SnapshotId, MalformedReason> {
        let value = self.next(opcode)?;
        value.as_i64().ok_or_else(|| self.invalid("instance id"))
    }

    fn optional_id(&mut self, opcode: Opcode) -> Result<Option<SnapshotId>, MalformedReason> {
        match self.next(opcode)? {
            Value::Null => Ok(None),
            value => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.invalid("instance id or null")),
        }
    }

    fn count(&mut self, opcode: Opcode) -> Result<usize, MalformedReason> {
        let value = self.next(opcode)?;
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| self.invalid("non-negative integer"))
    }
}
