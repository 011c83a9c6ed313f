//! 规则表达式的静态类型与固定绑定变量模式

use std::fmt;

/// 表达式静态类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Bool,
    Int,
    String,
    List(Box<Type>),
    /// 键类型固定为 string
    Map(Box<Type>),
    /// 通配符 "*" 或 类型名 -> list(string)
    Principal,
    Statement,
    /// 仅在运行期可确定（如混合类型的列表字面量元素）
    Dyn,
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn map(value: Type) -> Self {
        Type::Map(Box::new(value))
    }

    pub fn strings() -> Self {
        Type::list(Type::String)
    }

    /// 可作为布尔条件使用
    pub fn is_boolish(&self) -> bool {
        matches!(self, Type::Bool | Type::Dyn)
    }

    /// `==` / `!=` 两侧类型是否可比较
    pub fn comparable(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Dyn, _) | (_, Type::Dyn) => true,
            (Type::Principal, Type::String) | (Type::String, Type::Principal) => true,
            (Type::Principal, Type::Map(v)) | (Type::Map(v), Type::Principal) => v.comparable(&Type::strings()),
            (Type::List(a), Type::List(b)) => a.comparable(b),
            (Type::Map(a), Type::Map(b)) => a.comparable(b),
            (a, b) => a == b,
        }
    }

    /// 列表字面量元素类型合并：相同则保持，否则退化为 dyn
    pub fn unify(&self, other: &Type) -> Type {
        if self == other { self.clone() } else { Type::Dyn }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Map(value) => write!(f, "map(string, {})", value),
            Type::Principal => write!(f, "principal"),
            Type::Statement => write!(f, "statement"),
            Type::Dyn => write!(f, "dyn"),
        }
    }
}

/// 每次求值都可用的绑定变量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Name,
    Document,
    Version,
    Statement,
}

impl Binding {
    pub const ALL: [Binding; 4] = [Binding::Name, Binding::Document, Binding::Version, Binding::Statement];

    pub fn lookup(name: &str) -> Option<Binding> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Binding::Name => "Name",
            Binding::Document => "Document",
            Binding::Version => "Version",
            Binding::Statement => "Statement",
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Binding::Name | Binding::Document | Binding::Version => Type::String,
            Binding::Statement => Type::list(Type::Statement),
        }
    }
}

/// 语句记录的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementField {
    Sid,
    Effect,
    Action,
    NotAction,
    Resource,
    Principal,
    NotPrincipal,
    Condition,
}

impl StatementField {
    pub const ALL: [StatementField; 8] = [
        StatementField::Sid,
        StatementField::Effect,
        StatementField::Action,
        StatementField::NotAction,
        StatementField::Resource,
        StatementField::Principal,
        StatementField::NotPrincipal,
        StatementField::Condition,
    ];

    pub fn lookup(name: &str) -> Option<StatementField> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatementField::Sid => "Sid",
            StatementField::Effect => "Effect",
            StatementField::Action => "Action",
            StatementField::NotAction => "NotAction",
            StatementField::Resource => "Resource",
            StatementField::Principal => "Principal",
            StatementField::NotPrincipal => "NotPrincipal",
            StatementField::Condition => "Condition",
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            StatementField::Sid | StatementField::Effect => Type::String,
            StatementField::Action | StatementField::NotAction | StatementField::Resource => Type::strings(),
            StatementField::Principal | StatementField::NotPrincipal => Type::Principal,
            StatementField::Condition => Type::map(Type::map(Type::strings())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparable_types() {
        assert!(Type::String.comparable(&Type::String));
        assert!(Type::Principal.comparable(&Type::String));
        assert!(Type::strings().comparable(&Type::list(Type::Dyn)));
        assert!(Type::Principal.comparable(&Type::map(Type::strings())));
        assert!(!Type::strings().comparable(&Type::String));
        assert!(!Type::Int.comparable(&Type::String));
        assert!(!Type::Principal.comparable(&Type::map(Type::String)));
    }

    #[test]
    fn test_schema_lookup() {
        assert_eq!(Binding::lookup("Statement"), Some(Binding::Statement));
        assert_eq!(Binding::lookup("statement"), None);
        assert_eq!(StatementField::lookup("NotPrincipal"), Some(StatementField::NotPrincipal));
        assert_eq!(StatementField::lookup("Actions"), None);
        assert_eq!(
            StatementField::Condition.ty().to_string(),
            "map(string, map(string, list(string)))"
        );
    }
}
