//! 静态类型检查：未类型化语法树 -> 可执行节点树
//! 未声明的变量、不存在的字段、不匹配的操作数类型都在这里报错

use regex::Regex;

use super::parser::{BinaryOp, Expr, ExprKind, UnaryOp};
use super::types::{Binding, StatementField, Type};
use crate::error::{FinderError, FinderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Contains,
    StartsWith,
    EndsWith,
}

/// 推导宏
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comprehension {
    Exists,
    All,
    ExistsOne,
    Filter,
    Map,
}

impl Comprehension {
    fn lookup(name: &str) -> Option<Comprehension> {
        match name {
            "exists" => Some(Comprehension::Exists),
            "all" => Some(Comprehension::All),
            "exists_one" => Some(Comprehension::ExistsOne),
            "filter" => Some(Comprehension::Filter),
            "map" => Some(Comprehension::Map),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Pattern {
    /// 字面量正则，编译期完成编译
    Static(Regex),
    Dynamic(Box<Node>),
}

/// 类型检查后的可执行节点
#[derive(Debug, Clone)]
pub enum Node {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Node>),
    Var(Binding),
    /// 推导变量，值为作用域栈中的槽位
    Local(usize),
    Not(Box<Node>),
    Neg(Box<Node>),
    /// `&&` 链的全部操作数
    And(Vec<Node>),
    /// `||` 链的全部操作数
    Or(Vec<Node>),
    Eq(Box<Node>, Box<Node>),
    Ne(Box<Node>, Box<Node>),
    Compare(CmpOp, Box<Node>, Box<Node>),
    In(Box<Node>, Box<Node>),
    Field(Box<Node>, StatementField),
    Index(Box<Node>, Box<Node>),
    Size(Box<Node>),
    StringOp(StringOp, Box<Node>, Box<Node>),
    Matches(Box<Node>, Pattern),
    LowerAscii(Box<Node>),
    Comprehension {
        kind: Comprehension,
        range: Box<Node>,
        slot: usize,
        body: Box<Node>,
    },
}

/// 对语法树做类型检查，返回可执行节点及其静态类型
pub fn check(expr: &Expr) -> FinderResult<(Node, Type)> {
    Checker { scope: Vec::new() }.check(expr)
}

struct Checker {
    // 推导变量作用域栈：(变量名, 元素类型)
    scope: Vec<(String, Type)>,
}

impl Checker {
    fn check(&mut self, expr: &Expr) -> FinderResult<(Node, Type)> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Bool(b) => Ok((Node::Bool(*b), Type::Bool)),
            ExprKind::Int(n) => Ok((Node::Int(*n), Type::Int)),
            ExprKind::Str(s) => Ok((Node::Str(s.clone()), Type::String)),
            ExprKind::List(items) => self.check_list(items),
            ExprKind::Ident(name) => self.check_ident(name, pos),
            ExprKind::Unary(op, operand) => self.check_unary(*op, operand, pos),
            ExprKind::Binary(op, left, right) => self.check_binary(*op, left, right, pos),
            ExprKind::Logical(op, operands) => self.check_logical(*op, operands, pos),
            ExprKind::Member(target, name) => self.check_member(target, name, pos),
            ExprKind::Index(target, index) => self.check_index(target, index, pos),
            ExprKind::Call { target: None, func, args } => self.check_global_call(func, args, pos),
            ExprKind::Call {
                target: Some(target),
                func,
                args,
            } => self.check_method_call(target, func, args, pos),
        }
    }

    fn check_list(&mut self, items: &[Expr]) -> FinderResult<(Node, Type)> {
        let mut nodes = Vec::with_capacity(items.len());
        let mut elem: Option<Type> = None;
        for item in items {
            let (node, ty) = self.check(item)?;
            elem = Some(match elem {
                None => ty,
                Some(prev) => prev.unify(&ty),
            });
            nodes.push(node);
        }
        Ok((Node::List(nodes), Type::list(elem.unwrap_or(Type::Dyn))))
    }

    fn check_ident(&self, name: &str, pos: usize) -> FinderResult<(Node, Type)> {
        if let Some(slot) = self.scope.iter().rposition(|(var, _)| var == name) {
            return Ok((Node::Local(slot), self.scope[slot].1.clone()));
        }
        match Binding::lookup(name) {
            Some(binding) => Ok((Node::Var(binding), binding.ty())),
            None => Err(FinderError::compile(pos, format!("undeclared reference to '{}'", name))),
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr, pos: usize) -> FinderResult<(Node, Type)> {
        let (node, ty) = self.check(operand)?;
        match op {
            UnaryOp::Not if ty.is_boolish() => Ok((Node::Not(Box::new(node)), Type::Bool)),
            UnaryOp::Neg if matches!(ty, Type::Int | Type::Dyn) => Ok((Node::Neg(Box::new(node)), Type::Int)),
            UnaryOp::Not => Err(no_overload("!", &[&ty], pos)),
            UnaryOp::Neg => Err(no_overload("-", &[&ty], pos)),
        }
    }

    fn check_logical(&mut self, op: BinaryOp, operands: &[Expr], pos: usize) -> FinderResult<(Node, Type)> {
        let mut nodes = Vec::with_capacity(operands.len());
        let mut types = Vec::with_capacity(operands.len());
        for operand in operands {
            let (node, ty) = self.check(operand)?;
            nodes.push(node);
            types.push(ty);
        }
        if !types.iter().all(Type::is_boolish) {
            let types: Vec<&Type> = types.iter().collect();
            return Err(no_overload(op.symbol(), &types, pos));
        }
        let node = if op == BinaryOp::And { Node::And(nodes) } else { Node::Or(nodes) };
        Ok((node, Type::Bool))
    }

    fn check_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, pos: usize) -> FinderResult<(Node, Type)> {
        let (lnode, lty) = self.check(left)?;
        let (rnode, rty) = self.check(right)?;
        let (l, r) = (Box::new(lnode), Box::new(rnode));

        let node = match op {
            BinaryOp::Eq | BinaryOp::Ne if lty.comparable(&rty) => {
                if op == BinaryOp::Eq { Node::Eq(l, r) } else { Node::Ne(l, r) }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge if orderable(&lty, &rty) => {
                let cmp = match op {
                    BinaryOp::Lt => CmpOp::Lt,
                    BinaryOp::Le => CmpOp::Le,
                    BinaryOp::Gt => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                Node::Compare(cmp, l, r)
            }
            BinaryOp::In if membership(&lty, &rty) => Node::In(l, r),
            _ => return Err(no_overload(op.symbol(), &[&lty, &rty], pos)),
        };
        Ok((node, Type::Bool))
    }

    fn check_member(&mut self, target: &Expr, name: &str, pos: usize) -> FinderResult<(Node, Type)> {
        let (node, ty) = self.check(target)?;
        match ty {
            Type::Statement => match StatementField::lookup(name) {
                Some(field) => Ok((Node::Field(Box::new(node), field), field.ty())),
                None => Err(FinderError::compile(pos, format!("undefined field '{}' on statement", name))),
            },
            // map.key 等价于 map["key"]
            Type::Map(value) => Ok((Node::Index(Box::new(node), Box::new(Node::Str(name.to_string()))), *value)),
            Type::Principal => Ok((
                Node::Index(Box::new(node), Box::new(Node::Str(name.to_string()))),
                Type::strings(),
            )),
            other => Err(FinderError::compile(
                pos,
                format!("type '{}' does not support field selection", other),
            )),
        }
    }

    fn check_index(&mut self, target: &Expr, index: &Expr, pos: usize) -> FinderResult<(Node, Type)> {
        let (tnode, tty) = self.check(target)?;

        // statement["Field"] 只接受字面量字段名
        if tty == Type::Statement {
            let ExprKind::Str(name) = &index.kind else {
                return Err(FinderError::compile(index.pos, "statement index must be a string literal"));
            };
            return match StatementField::lookup(name) {
                Some(field) => Ok((Node::Field(Box::new(tnode), field), field.ty())),
                None => Err(FinderError::compile(index.pos, format!("undefined field '{}' on statement", name))),
            };
        }

        let (inode, ity) = self.check(index)?;
        let result = match (&tty, &ity) {
            (Type::List(elem), Type::Int | Type::Dyn) => (**elem).clone(),
            (Type::Map(value), Type::String | Type::Dyn) => (**value).clone(),
            (Type::Principal, Type::String | Type::Dyn) => Type::strings(),
            _ => return Err(no_overload("_[_]", &[&tty, &ity], pos)),
        };
        Ok((Node::Index(Box::new(tnode), Box::new(inode)), result))
    }

    fn check_global_call(&mut self, func: &str, args: &[Expr], pos: usize) -> FinderResult<(Node, Type)> {
        match func {
            "size" => {
                expect_arity(func, args, 1, pos)?;
                let (node, ty) = self.check(&args[0])?;
                self.size_node(node, &ty, pos)
            }
            _ => Err(FinderError::compile(pos, format!("undeclared reference to function '{}'", func))),
        }
    }

    fn check_method_call(&mut self, target: &Expr, func: &str, args: &[Expr], pos: usize) -> FinderResult<(Node, Type)> {
        if let Some(kind) = Comprehension::lookup(func) {
            return self.check_comprehension(kind, target, func, args, pos);
        }

        let (tnode, tty) = self.check(target)?;
        match func {
            "size" => {
                expect_arity(func, args, 0, pos)?;
                self.size_node(tnode, &tty, pos)
            }
            "contains" | "startsWith" | "endsWith" => {
                expect_arity(func, args, 1, pos)?;
                let (anode, aty) = self.check(&args[0])?;
                if !is_stringish(&tty) || !is_stringish(&aty) {
                    return Err(no_overload(func, &[&tty, &aty], pos));
                }
                let op = match func {
                    "contains" => StringOp::Contains,
                    "startsWith" => StringOp::StartsWith,
                    _ => StringOp::EndsWith,
                };
                Ok((Node::StringOp(op, Box::new(tnode), Box::new(anode)), Type::Bool))
            }
            "matches" => {
                expect_arity(func, args, 1, pos)?;
                let pattern = match &args[0].kind {
                    ExprKind::Str(re) => Pattern::Static(Regex::new(re).map_err(|e| {
                        FinderError::compile(args[0].pos, format!("invalid regular expression: {}", e))
                    })?),
                    _ => {
                        let (anode, aty) = self.check(&args[0])?;
                        if !is_stringish(&aty) {
                            return Err(no_overload(func, &[&tty, &aty], pos));
                        }
                        Pattern::Dynamic(Box::new(anode))
                    }
                };
                if !is_stringish(&tty) {
                    return Err(no_overload(func, &[&tty, &Type::String], pos));
                }
                Ok((Node::Matches(Box::new(tnode), pattern), Type::Bool))
            }
            "lowerAscii" => {
                expect_arity(func, args, 0, pos)?;
                if !is_stringish(&tty) {
                    return Err(no_overload(func, &[&tty], pos));
                }
                Ok((Node::LowerAscii(Box::new(tnode)), Type::String))
            }
            _ => Err(FinderError::compile(pos, format!("undeclared reference to method '{}'", func))),
        }
    }

    fn check_comprehension(
        &mut self,
        kind: Comprehension,
        target: &Expr,
        func: &str,
        args: &[Expr],
        pos: usize,
    ) -> FinderResult<(Node, Type)> {
        expect_arity(func, args, 2, pos)?;
        let ExprKind::Ident(var) = &args[0].kind else {
            return Err(FinderError::compile(args[0].pos, format!("{}() variable must be a simple identifier", func)));
        };
        if Binding::lookup(var).is_some() {
            return Err(FinderError::compile(
                args[0].pos,
                format!("{}() variable '{}' shadows a bound variable", func, var),
            ));
        }

        let (range, range_ty) = self.check(target)?;
        let elem = match &range_ty {
            Type::List(elem) => (**elem).clone(),
            // 映射按键迭代
            Type::Map(_) | Type::Principal => Type::String,
            other => {
                return Err(FinderError::compile(
                    pos,
                    format!("{}() requires a list or map, found '{}'", func, other),
                ));
            }
        };

        let slot = self.scope.len();
        self.scope.push((var.clone(), elem.clone()));
        let body = self.check(&args[1]);
        self.scope.pop();
        let (body, body_ty) = body?;

        let result = match kind {
            Comprehension::Map => Type::list(body_ty),
            _ if !body_ty.is_boolish() => {
                return Err(FinderError::compile(
                    args[1].pos,
                    format!("{}() predicate must be bool, found '{}'", func, body_ty),
                ));
            }
            Comprehension::Filter => Type::list(elem),
            _ => Type::Bool,
        };

        Ok((
            Node::Comprehension {
                kind,
                range: Box::new(range),
                slot,
                body: Box::new(body),
            },
            result,
        ))
    }

    fn size_node(&self, node: Node, ty: &Type, pos: usize) -> FinderResult<(Node, Type)> {
        match ty {
            Type::String | Type::List(_) | Type::Map(_) | Type::Principal | Type::Dyn => {
                Ok((Node::Size(Box::new(node)), Type::Int))
            }
            other => Err(no_overload("size", &[other], pos)),
        }
    }
}

fn is_stringish(ty: &Type) -> bool {
    matches!(ty, Type::String | Type::Dyn)
}

fn orderable(left: &Type, right: &Type) -> bool {
    match (left, right) {
        (Type::Dyn, Type::Int | Type::String | Type::Dyn) | (Type::Int | Type::String, Type::Dyn) => true,
        (Type::Int, Type::Int) | (Type::String, Type::String) => true,
        _ => false,
    }
}

fn membership(item: &Type, container: &Type) -> bool {
    match container {
        Type::List(elem) => item.comparable(elem),
        Type::Map(_) | Type::Principal => is_stringish(item),
        Type::Dyn => true,
        _ => false,
    }
}

fn expect_arity(func: &str, args: &[Expr], expected: usize, pos: usize) -> FinderResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(FinderError::compile(
            pos,
            format!("{}() expects {} argument(s), found {}", func, expected, args.len()),
        ))
    }
}

fn no_overload(op: &str, operands: &[&Type], pos: usize) -> FinderError {
    let operands: Vec<String> = operands.iter().map(|t| t.to_string()).collect();
    FinderError::compile(
        pos,
        format!("found no matching overload for '{}' applied to ({})", op, operands.join(", ")),
    )
}
