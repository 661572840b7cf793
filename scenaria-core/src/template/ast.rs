use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Dollar,
    Selector {
        base: Box<Expr>,
        name: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `fn <-`: only meaningful as a mapping key with an argument document.
    LeftArrow {
        callee: Box<Expr>,
    },
}

impl Expr {
    pub fn uses_dollar(&self) -> bool {
        match self {
            Expr::Dollar => true,
            Expr::Literal(_) | Expr::Ident(_) => false,
            Expr::Selector { base, .. } => base.uses_dollar(),
            Expr::Index { base, index } => base.uses_dollar() || index.uses_dollar(),
            Expr::Call { callee, args } => {
                callee.uses_dollar() || args.iter().any(Expr::uses_dollar)
            }
            Expr::Unary { expr, .. } => expr.uses_dollar(),
            Expr::Binary { left, right, .. } => left.uses_dollar() || right.uses_dollar(),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => cond.uses_dollar() || then.uses_dollar() || otherwise.uses_dollar(),
            Expr::LeftArrow { callee } => callee.uses_dollar(),
        }
    }

    /// Dotted text of a lookup chain such as `vars.items[0].name`.
    pub fn path_text(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Dollar => Some("$".to_string()),
            Expr::Selector { base, name } => Some(format!("{}.{name}", base.path_text()?)),
            Expr::Index { base, index } => {
                let base = base.path_text()?;
                match index.as_ref() {
                    Expr::Literal(Value::Int(i)) => Some(format!("{base}[{i}]")),
                    Expr::Literal(Value::Uint(i)) => Some(format!("{base}[{i}]")),
                    Expr::Literal(Value::String(k)) => Some(format!("{base}[{k:?}]")),
                    _ => Some(format!("{base}[...]")),
                }
            }
            _ => None,
        }
    }
}
