//! 求值期间的运行时值
//! 绝大多数值直接借用绑定变量中的数据，只有字面量运算结果才会分配

use std::borrow::Cow;

use super::types::StatementField;
use crate::policy::{CanonicalStatement, Condition, ConditionEntries, Principal};

/// 映射中不存在的条件运算符返回空映射
static EMPTY_ENTRIES: ConditionEntries = ConditionEntries::new();

#[derive(Debug, Clone)]
pub enum Value<'a> {
    Bool(bool),
    Int(i64),
    Str(Cow<'a, str>),
    /// 借用的字符串列表（Action / Resource / Principal 标识等）
    Strings(&'a [String]),
    /// 字面量或推导产生的列表
    List(Vec<Value<'a>>),
    Statements(&'a [CanonicalStatement]),
    Statement(&'a CanonicalStatement),
    Principal(&'a Principal),
    /// string -> list(string)
    StringMap(&'a ConditionEntries),
    Condition(&'a Condition),
}

impl<'a> Value<'a> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Strings(_) | Value::List(_) | Value::Statements(_) => "list",
            Value::Statement(_) => "statement",
            Value::Principal(_) => "principal",
            Value::StringMap(_) | Value::Condition(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Result<bool, String> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(format!("expected bool, found {}", other.type_name())),
        }
    }

    pub fn as_int(&self) -> Result<i64, String> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(format!("expected int, found {}", other.type_name())),
        }
    }

    pub fn as_str(&self) -> Result<&str, String> {
        match self {
            Value::Str(s) => Ok(&**s),
            other => Err(format!("expected string, found {}", other.type_name())),
        }
    }

    /// 迭代元素：列表按元素，映射按键
    pub fn elements(&self) -> Result<Vec<Value<'a>>, String> {
        match self {
            Value::Strings(items) => Ok(borrowed_strings(items)),
            Value::List(items) => Ok(items.clone()),
            Value::Statements(items) => Ok(items.iter().map(Value::Statement).collect()),
            Value::StringMap(map) => Ok(map.keys().map(|k| Value::Str(Cow::Borrowed(k.as_str()))).collect()),
            Value::Condition(map) => Ok(map.keys().map(|k| Value::Str(Cow::Borrowed(k.as_str()))).collect()),
            Value::Principal(principal) => match principal {
                Principal::Wildcard => Err(wildcard_error("iterate")),
                Principal::Mapping(map) => Ok(map.keys().map(|k| Value::Str(Cow::Borrowed(k.as_str()))).collect()),
            },
            other => Err(format!("cannot iterate over {}", other.type_name())),
        }
    }

    pub fn size(&self) -> Result<i64, String> {
        let len = match self {
            Value::Str(s) => s.chars().count(),
            Value::Strings(items) => items.len(),
            Value::List(items) => items.len(),
            Value::Statements(items) => items.len(),
            Value::StringMap(map) => map.len(),
            Value::Condition(map) => map.len(),
            Value::Principal(Principal::Mapping(map)) => map.len(),
            Value::Principal(Principal::Wildcard) => return Err(wildcard_error("take the size of")),
            other => return Err(format!("no such overload: size({})", other.type_name())),
        };
        Ok(len as i64)
    }

    /// 语句字段访问
    pub fn field(&self, field: StatementField) -> Result<Value<'a>, String> {
        let Value::Statement(stmt) = self else {
            return Err(format!("cannot select field '{}' on {}", field.name(), self.type_name()));
        };
        let stmt: &'a CanonicalStatement = stmt;
        Ok(match field {
            StatementField::Sid => Value::Str(Cow::Borrowed(stmt.sid.as_str())),
            StatementField::Effect => Value::Str(Cow::Borrowed(stmt.effect.as_str())),
            StatementField::Action => Value::Strings(&stmt.action),
            StatementField::NotAction => Value::Strings(&stmt.not_action),
            StatementField::Resource => Value::Strings(&stmt.resource),
            StatementField::Principal => Value::Principal(&stmt.principal),
            StatementField::NotPrincipal => Value::Principal(&stmt.not_principal),
            StatementField::Condition => Value::Condition(&stmt.condition),
        })
    }

    /// 下标访问：列表越界报错，映射缺失键返回空值
    pub fn index(&self, key: &Value<'_>) -> Result<Value<'a>, String> {
        match (self, key) {
            (Value::Strings(items), Value::Int(i)) => {
                let i = list_position(*i, items.len())?;
                Ok(Value::Str(Cow::Borrowed(items[i].as_str())))
            }
            (Value::List(items), Value::Int(i)) => {
                let i = list_position(*i, items.len())?;
                Ok(items[i].clone())
            }
            (Value::Statements(items), Value::Int(i)) => {
                let i = list_position(*i, items.len())?;
                Ok(Value::Statement(&items[i]))
            }
            (Value::StringMap(map), Value::Str(k)) => Ok(entries_get(map, k)),
            (Value::Principal(principal), Value::Str(k)) => match principal {
                Principal::Wildcard => Err(wildcard_error("index")),
                Principal::Mapping(map) => Ok(entries_get(map, k)),
            },
            (Value::Condition(cond), Value::Str(k)) => {
                let cond: &'a Condition = cond;
                Ok(Value::StringMap(cond.get(&**k).unwrap_or(&EMPTY_ENTRIES)))
            }
            (target, key) => Err(format!(
                "no such overload: {}[{}]",
                target.type_name(),
                key.type_name()
            )),
        }
    }

    /// `item in self`
    pub fn contains(&self, item: &Value<'_>) -> Result<bool, String> {
        match self {
            Value::Strings(_) | Value::List(_) | Value::Statements(_) => {
                Ok(self.elements()?.iter().any(|elem| elem.equals(item)))
            }
            Value::StringMap(map) => Ok(map.contains_key(item.as_str()?)),
            Value::Condition(map) => Ok(map.contains_key(item.as_str()?)),
            Value::Principal(Principal::Mapping(map)) => Ok(map.contains_key(item.as_str()?)),
            Value::Principal(Principal::Wildcard) => Err(wildcard_error("test membership in")),
            other => Err(format!("no such overload: {} in {}", item.type_name(), other.type_name())),
        }
    }

    /// 相等比较，不同类型之间恒为不等
    ///
    /// 通配符 Principal 与字符串 "*" 相等，映射形式的 Principal 与等价的映射相等。
    pub fn equals(&self, other: &Value<'_>) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Statement(a), Value::Statement(b)) => a == b,
            (Value::Principal(Principal::Wildcard), Value::Str(s))
            | (Value::Str(s), Value::Principal(Principal::Wildcard)) => s == "*",
            (Value::Principal(a), Value::Principal(b)) => a == b,
            (Value::Principal(Principal::Mapping(a)), Value::StringMap(b))
            | (Value::StringMap(b), Value::Principal(Principal::Mapping(a))) => a == *b,
            (Value::StringMap(a), Value::StringMap(b)) => a == b,
            (Value::Condition(a), Value::Condition(b)) => a == b,
            (a, b) if a.is_list() && b.is_list() => match (a.elements(), b.elements()) {
                (Ok(xs), Ok(ys)) => xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| x.equals(y)),
                _ => false,
            },
            _ => false,
        }
    }

    fn is_list(&self) -> bool {
        matches!(self, Value::Strings(_) | Value::List(_) | Value::Statements(_))
    }
}

fn borrowed_strings(items: &[String]) -> Vec<Value<'_>> {
    items.iter().map(|s| Value::Str(Cow::Borrowed(s.as_str()))).collect()
}

fn entries_get<'a>(map: &'a ConditionEntries, key: &str) -> Value<'a> {
    Value::Strings(map.get(key).map(Vec::as_slice).unwrap_or(&[]))
}

fn list_position(index: i64, len: usize) -> Result<usize, String> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| format!("index out of range: {} (size {})", index, len))
}

fn wildcard_error(action: &str) -> String {
    format!("cannot {} a wildcard principal", action)
}
