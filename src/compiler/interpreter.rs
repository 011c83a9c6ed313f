//! 节点树解释执行
//! `&&` / `||` / exists / all 对错误做交换律吸收：只要另一侧已能确定结果，错误就被忽略

use std::borrow::Cow;

use regex::Regex;

use super::checker::{CmpOp, Comprehension, Node, Pattern, StringOp};
use super::program::Bindings;
use super::types::Binding;
use super::value::Value;

type EvalResult<'a> = Result<Value<'a>, String>;

/// 在给定绑定变量上求值
pub(crate) fn eval<'a>(node: &'a Node, bindings: &Bindings<'a>) -> EvalResult<'a> {
    Interpreter {
        bindings,
        locals: Vec::new(),
    }
    .eval(node)
}

struct Interpreter<'b, 'a> {
    bindings: &'b Bindings<'a>,
    // 推导变量的当前值，下标即槽位
    locals: Vec<Value<'a>>,
}

impl<'b, 'a> Interpreter<'b, 'a> {
    fn eval(&mut self, node: &'a Node) -> EvalResult<'a> {
        match node {
            Node::Bool(b) => Ok(Value::Bool(*b)),
            Node::Int(n) => Ok(Value::Int(*n)),
            Node::Str(s) => Ok(Value::Str(Cow::Borrowed(s.as_str()))),
            Node::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Node::Var(binding) => Ok(self.variable(*binding)),
            Node::Local(slot) => self
                .locals
                .get(*slot)
                .cloned()
                .ok_or_else(|| format!("unbound comprehension variable at slot {}", slot)),
            Node::Not(operand) => Ok(Value::Bool(!self.eval(operand)?.as_bool()?)),
            Node::Neg(operand) => {
                let n = self.eval(operand)?.as_int()?;
                n.checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| format!("integer overflow: -({})", n))
            }
            Node::And(operands) => self.logical(operands, false),
            Node::Or(operands) => self.logical(operands, true),
            Node::Eq(left, right) => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                Ok(Value::Bool(l.equals(&r)))
            }
            Node::Ne(left, right) => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                Ok(Value::Bool(!l.equals(&r)))
            }
            Node::Compare(op, left, right) => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                compare(*op, &l, &r).map(Value::Bool)
            }
            Node::In(item, container) => {
                let (item, container) = (self.eval(item)?, self.eval(container)?);
                container.contains(&item).map(Value::Bool)
            }
            Node::Field(target, field) => self.eval(target)?.field(*field),
            Node::Index(target, key) => {
                let (target, key) = (self.eval(target)?, self.eval(key)?);
                target.index(&key)
            }
            Node::Size(target) => self.eval(target)?.size().map(Value::Int),
            Node::StringOp(op, target, arg) => {
                let (target, arg) = (self.eval(target)?, self.eval(arg)?);
                let (s, arg) = (target.as_str()?, arg.as_str()?);
                Ok(Value::Bool(match op {
                    StringOp::Contains => s.contains(arg),
                    StringOp::StartsWith => s.starts_with(arg),
                    StringOp::EndsWith => s.ends_with(arg),
                }))
            }
            Node::Matches(target, pattern) => {
                let target = self.eval(target)?;
                let s = target.as_str()?;
                let matched = match pattern {
                    Pattern::Static(re) => re.is_match(s),
                    Pattern::Dynamic(pattern) => {
                        let pattern = self.eval(pattern)?;
                        let re = Regex::new(pattern.as_str()?)
                            .map_err(|e| format!("invalid regular expression: {}", e))?;
                        re.is_match(s)
                    }
                };
                Ok(Value::Bool(matched))
            }
            Node::LowerAscii(target) => {
                let target = self.eval(target)?;
                Ok(Value::Str(Cow::Owned(target.as_str()?.to_ascii_lowercase())))
            }
            Node::Comprehension {
                kind,
                range,
                slot,
                body,
            } => {
                let elements = self.eval(range)?.elements()?;
                self.comprehension(*kind, elements, *slot, body)
            }
        }
    }

    fn variable(&self, binding: Binding) -> Value<'a> {
        match binding {
            Binding::Name => Value::Str(Cow::Borrowed(self.bindings.name)),
            Binding::Document => Value::Str(Cow::Borrowed(self.bindings.document)),
            Binding::Version => Value::Str(Cow::Borrowed(self.bindings.version)),
            Binding::Statement => Value::Statements(self.bindings.statements),
        }
    }

    // short_circuit 为 false 时是 `&&`，为 true 时是 `||`
    // 任一操作数取到 short_circuit 即确定结果；否则返回最左侧的错误
    fn logical(&mut self, operands: &'a [Node], short_circuit: bool) -> EvalResult<'a> {
        let mut first_error = None;
        for operand in operands {
            match self.eval(operand).and_then(|v| v.as_bool()) {
                Ok(b) if b == short_circuit => return Ok(Value::Bool(short_circuit)),
                Ok(_) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(Value::Bool(!short_circuit)),
        }
    }

    fn comprehension(
        &mut self,
        kind: Comprehension,
        elements: Vec<Value<'a>>,
        slot: usize,
        body: &'a Node,
    ) -> EvalResult<'a> {
        self.locals.truncate(slot);
        match kind {
            Comprehension::Exists | Comprehension::All => {
                // exists 遇到 true 即可确定，all 遇到 false 即可确定
                let decisive = kind == Comprehension::Exists;
                let mut first_error = None;
                for elem in elements {
                    match self.with_local(elem, body).and_then(|v| v.as_bool()) {
                        Ok(b) if b == decisive => return Ok(Value::Bool(decisive)),
                        Ok(_) => {}
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                match first_error {
                    Some(e) => Err(e),
                    None => Ok(Value::Bool(!decisive)),
                }
            }
            Comprehension::ExistsOne => {
                let mut count = 0usize;
                for elem in elements {
                    if self.with_local(elem, body)?.as_bool()? {
                        count += 1;
                    }
                }
                Ok(Value::Bool(count == 1))
            }
            Comprehension::Filter => {
                let mut kept = Vec::new();
                for elem in elements {
                    if self.with_local(elem.clone(), body)?.as_bool()? {
                        kept.push(elem);
                    }
                }
                Ok(Value::List(kept))
            }
            Comprehension::Map => elements
                .into_iter()
                .map(|elem| self.with_local(elem, body))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }

    fn with_local(&mut self, elem: Value<'a>, body: &'a Node) -> EvalResult<'a> {
        self.locals.push(elem);
        let result = self.eval(body);
        self.locals.pop();
        result
    }
}

fn compare(op: CmpOp, left: &Value<'_>, right: &Value<'_>) -> Result<bool, String> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (a, b) => {
            return Err(format!(
                "no such overload: {} compared with {}",
                a.type_name(),
                b.type_name()
            ));
        }
    };
    Ok(match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
    })
}
