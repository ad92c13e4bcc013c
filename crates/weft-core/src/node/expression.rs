//! Expression nodes
//!
//! Every expression kind owns `lpar`/`rpar` sequences: the parentheses that
//! wrap it, outermost first in `lpar` and innermost first in `rpar`.

use super::{
    Accepts, CstNode, FieldSpec, FieldValue, Node, NodeKind, check_trivia, codegen_all,
    codegen_separator, map_all, map_maybe, map_optional, validate_parens,
};
use crate::codegen::{CodegenContext, CodegenState};
use crate::error::CstError;
use crate::result::Result;
use crate::sentinel::MaybeSentinel;
use crate::trivia::BaseWhitespace;

const LPAR: FieldSpec = FieldSpec::sequence("lpar", Accepts::Kind(NodeKind::LeftParen));
const RPAR: FieldSpec = FieldSpec::sequence("rpar", Accepts::Kind(NodeKind::RightParen));

macro_rules! atom {
    ($(#[$meta:meta])* $kind:ident, $check:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $kind {
            pub value: String,
            pub lpar: Vec<Node>,
            pub rpar: Vec<Node>,
        }

        impl $kind {
            pub fn new(value: impl Into<String>) -> Self {
                Self {
                    value: value.into(),
                    lpar: Vec::new(),
                    rpar: Vec::new(),
                }
            }
        }

        impl CstNode for $kind {
            const KIND: NodeKind = NodeKind::$kind;
            const FIELDS: &'static [FieldSpec] = &[LPAR, FieldSpec::scalar("value"), RPAR];

            fn get_field(&self, name: &str) -> Option<FieldValue> {
                match name {
                    "lpar" => Some(self.lpar.clone().into()),
                    "value" => Some(self.value.clone().into()),
                    "rpar" => Some(self.rpar.clone().into()),
                    _ => None,
                }
            }

            fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
                match spec.name {
                    "lpar" => self.lpar = value.into_nodes(Self::KIND, spec)?,
                    "value" => self.value = value.into_text(Self::KIND, spec)?,
                    "rpar" => self.rpar = value.into_nodes(Self::KIND, spec)?,
                    other => return Err(CstError::invalid_field(Self::KIND, other)),
                }
                Ok(())
            }

            fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
                map_all(&mut self.lpar, f);
                map_all(&mut self.rpar, f);
            }

            fn validate(&self) -> Result<()> {
                validate_parens(Self::KIND, &self.lpar, &self.rpar)?;
                $check(&self.value).map_err(|message| CstError::invalid_node(Self::KIND, message))
            }

            fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
                codegen_all(&self.lpar, state);
                state.add_token(&self.value);
                codegen_all(&self.rpar, state);
            }
        }
    };
}

atom!(
    /// An identifier
    Name, check_identifier
);
atom!(
    /// An integer literal, kept as written
    Integer, check_integer
);
atom!(
    /// A floating point literal, kept as written
    Float, check_float
);
atom!(
    /// A single string literal including prefix and quotes
    SimpleString, check_string
);

fn check_identifier(value: &str) -> std::result::Result<(), String> {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err("Cannot have empty name identifier.".to_string());
    };
    if !(first == '_' || first.is_alphabetic()) || !chars.all(|c| c == '_' || c.is_alphanumeric())
    {
        return Err(format!("'{value}' is not a valid identifier"));
    }
    Ok(())
}

fn check_integer(value: &str) -> std::result::Result<(), String> {
    if !value.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("'{value}' is not an integer literal"));
    }
    Ok(())
}

fn check_float(value: &str) -> std::result::Result<(), String> {
    if !value.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(format!("'{value}' is not a float literal"));
    }
    Ok(())
}

fn check_string(value: &str) -> std::result::Result<(), String> {
    let body_start = value.find(['\'', '"']).unwrap_or(value.len());
    let (prefix, body) = value.split_at(body_start);
    if prefix.len() > 2 || !prefix.chars().all(|c| "rRbBuUfF".contains(c)) {
        return Err("Invalid string prefix.".to_string());
    }
    let Some(quote) = body.chars().next() else {
        return Err("String must be quoted.".to_string());
    };
    if body.len() < 2 || !body.ends_with(quote) {
        return Err("String must have matching quotes.".to_string());
    }
    Ok(())
}

/// A call: `func(args)`
#[derive(Debug, Clone)]
pub struct Call {
    pub func: Node,
    pub whitespace_after_func: BaseWhitespace,
    pub whitespace_before_args: BaseWhitespace,
    pub args: Vec<Node>,
    pub lpar: Vec<Node>,
    pub rpar: Vec<Node>,
}

impl Call {
    pub fn new(func: Node, args: Vec<Node>) -> Self {
        Self {
            func,
            whitespace_after_func: BaseWhitespace::empty(),
            whitespace_before_args: BaseWhitespace::empty(),
            args,
            lpar: Vec::new(),
            rpar: Vec::new(),
        }
    }
}

impl CstNode for Call {
    const KIND: NodeKind = NodeKind::Call;
    const FIELDS: &'static [FieldSpec] = &[
        LPAR,
        FieldSpec::required("func", Accepts::Expression),
        FieldSpec::trivia("whitespace_after_func"),
        FieldSpec::trivia("whitespace_before_args"),
        FieldSpec::sequence("args", Accepts::Kind(NodeKind::Arg)),
        RPAR,
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "lpar" => Some(self.lpar.clone().into()),
            "func" => Some(self.func.clone().into()),
            "whitespace_after_func" => Some(self.whitespace_after_func.clone().into()),
            "whitespace_before_args" => Some(self.whitespace_before_args.clone().into()),
            "args" => Some(self.args.clone().into()),
            "rpar" => Some(self.rpar.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "lpar" => self.lpar = value.into_nodes(Self::KIND, spec)?,
            "func" => self.func = value.into_node(Self::KIND, spec)?,
            "whitespace_after_func" => {
                self.whitespace_after_func = value.into_whitespace(Self::KIND, spec)?
            }
            "whitespace_before_args" => {
                self.whitespace_before_args = value.into_whitespace(Self::KIND, spec)?
            }
            "args" => self.args = value.into_nodes(Self::KIND, spec)?,
            "rpar" => self.rpar = value.into_nodes(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.lpar, f);
        self.func = f(&self.func);
        map_all(&mut self.args, f);
        map_all(&mut self.rpar, f);
    }

    fn validate(&self) -> Result<()> {
        validate_parens(Self::KIND, &self.lpar, &self.rpar)?;
        check_trivia(Self::KIND, self.whitespace_after_func.validate())?;
        check_trivia(Self::KIND, self.whitespace_before_args.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        codegen_all(&self.lpar, state);
        self.func.codegen(state, CodegenContext::default());
        self.whitespace_after_func.codegen(state);
        state.add_token("(");
        self.whitespace_before_args.codegen(state);
        let last = self.args.len().saturating_sub(1);
        for (idx, arg) in self.args.iter().enumerate() {
            arg.codegen(state, CodegenContext::separated(idx < last));
        }
        state.add_token(")");
        codegen_all(&self.rpar, state);
    }
}

/// One argument of a [`Call`], optionally passed by keyword
#[derive(Debug, Clone)]
pub struct Arg {
    pub keyword: Option<Node>,
    pub equal: MaybeSentinel<Node>,
    pub value: Node,
    pub comma: MaybeSentinel<Node>,
    pub whitespace_after_arg: BaseWhitespace,
}

impl Arg {
    pub fn new(value: Node) -> Self {
        Self {
            keyword: None,
            equal: MaybeSentinel::Default,
            value,
            comma: MaybeSentinel::Default,
            whitespace_after_arg: BaseWhitespace::empty(),
        }
    }

    pub fn keyword(keyword: Node, value: Node) -> Self {
        Self {
            keyword: Some(keyword),
            ..Self::new(value)
        }
    }
}

impl CstNode for Arg {
    const KIND: NodeKind = NodeKind::Arg;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("keyword", Accepts::Kind(NodeKind::Name)),
        FieldSpec::maybe("equal", Accepts::Kind(NodeKind::AssignEqual)),
        FieldSpec::required("value", Accepts::Expression),
        FieldSpec::maybe("comma", Accepts::Kind(NodeKind::Comma)),
        FieldSpec::trivia("whitespace_after_arg"),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "keyword" => Some(self.keyword.clone().into()),
            "equal" => Some(self.equal.clone().into()),
            "value" => Some(self.value.clone().into()),
            "comma" => Some(self.comma.clone().into()),
            "whitespace_after_arg" => Some(self.whitespace_after_arg.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "keyword" => self.keyword = value.into_optional_node(Self::KIND, spec)?,
            "equal" => self.equal = value.into_maybe_node(Self::KIND, spec)?,
            "value" => self.value = value.into_node(Self::KIND, spec)?,
            "comma" => self.comma = value.into_maybe_node(Self::KIND, spec)?,
            "whitespace_after_arg" => {
                self.whitespace_after_arg = value.into_whitespace(Self::KIND, spec)?
            }
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_optional(&mut self.keyword, f);
        map_maybe(&mut self.equal, f);
        self.value = f(&self.value);
        map_maybe(&mut self.comma, f);
    }

    fn validate(&self) -> Result<()> {
        if self.keyword.is_none() && !self.equal.is_default() {
            return Err(CstError::invalid_node(
                Self::KIND,
                "Must have a keyword when specifying an AssignEqual.",
            ));
        }
        check_trivia(Self::KIND, self.whitespace_after_arg.validate())
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        if let Some(keyword) = &self.keyword {
            keyword.codegen(state, CodegenContext::default());
            match &self.equal {
                MaybeSentinel::Present(equal) => equal.codegen(state, CodegenContext::default()),
                MaybeSentinel::Default => state.add_token("="),
            }
        }
        self.value.codegen(state, CodegenContext::default());
        codegen_separator(&self.comma, ", ", state, ctx);
        self.whitespace_after_arg.codegen(state);
    }
}

/// Attribute access: `value.attr`
#[derive(Debug, Clone)]
pub struct Attribute {
    pub value: Node,
    pub dot: Node,
    pub attr: Node,
    pub lpar: Vec<Node>,
    pub rpar: Vec<Node>,
}

impl CstNode for Attribute {
    const KIND: NodeKind = NodeKind::Attribute;
    const FIELDS: &'static [FieldSpec] = &[
        LPAR,
        FieldSpec::required("value", Accepts::Expression),
        FieldSpec::required("dot", Accepts::Kind(NodeKind::Dot)),
        FieldSpec::required("attr", Accepts::Kind(NodeKind::Name)),
        RPAR,
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "lpar" => Some(self.lpar.clone().into()),
            "value" => Some(self.value.clone().into()),
            "dot" => Some(self.dot.clone().into()),
            "attr" => Some(self.attr.clone().into()),
            "rpar" => Some(self.rpar.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "lpar" => self.lpar = value.into_nodes(Self::KIND, spec)?,
            "value" => self.value = value.into_node(Self::KIND, spec)?,
            "dot" => self.dot = value.into_node(Self::KIND, spec)?,
            "attr" => self.attr = value.into_node(Self::KIND, spec)?,
            "rpar" => self.rpar = value.into_nodes(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.lpar, f);
        self.value = f(&self.value);
        self.dot = f(&self.dot);
        self.attr = f(&self.attr);
        map_all(&mut self.rpar, f);
    }

    fn validate(&self) -> Result<()> {
        validate_parens(Self::KIND, &self.lpar, &self.rpar)
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        codegen_all(&self.lpar, state);
        self.value.codegen(state, CodegenContext::default());
        self.dot.codegen(state, CodegenContext::default());
        self.attr.codegen(state, CodegenContext::default());
        codegen_all(&self.rpar, state);
    }
}

/// `left <op> right`
#[derive(Debug, Clone)]
pub struct BinaryOperation {
    pub left: Node,
    pub operator: Node,
    pub right: Node,
    pub lpar: Vec<Node>,
    pub rpar: Vec<Node>,
}

impl BinaryOperation {
    pub fn new(left: Node, operator: Node, right: Node) -> Self {
        Self {
            left,
            operator,
            right,
            lpar: Vec::new(),
            rpar: Vec::new(),
        }
    }
}

impl CstNode for BinaryOperation {
    const KIND: NodeKind = NodeKind::BinaryOperation;
    const FIELDS: &'static [FieldSpec] = &[
        LPAR,
        FieldSpec::required("left", Accepts::Expression),
        FieldSpec::required("operator", Accepts::Kind(NodeKind::BinaryOperator)),
        FieldSpec::required("right", Accepts::Expression),
        RPAR,
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "lpar" => Some(self.lpar.clone().into()),
            "left" => Some(self.left.clone().into()),
            "operator" => Some(self.operator.clone().into()),
            "right" => Some(self.right.clone().into()),
            "rpar" => Some(self.rpar.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "lpar" => self.lpar = value.into_nodes(Self::KIND, spec)?,
            "left" => self.left = value.into_node(Self::KIND, spec)?,
            "operator" => self.operator = value.into_node(Self::KIND, spec)?,
            "right" => self.right = value.into_node(Self::KIND, spec)?,
            "rpar" => self.rpar = value.into_nodes(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.lpar, f);
        self.left = f(&self.left);
        self.operator = f(&self.operator);
        self.right = f(&self.right);
        map_all(&mut self.rpar, f);
    }

    fn validate(&self) -> Result<()> {
        validate_parens(Self::KIND, &self.lpar, &self.rpar)
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        codegen_all(&self.lpar, state);
        self.left.codegen(state, CodegenContext::default());
        self.operator.codegen(state, CodegenContext::default());
        self.right.codegen(state, CodegenContext::default());
        codegen_all(&self.rpar, state);
    }
}

const BINARY_OPERATORS: &[&str] = &["+", "-", "*", "/", "%", "//", "**", "@"];

/// The operator token of a [`BinaryOperation`] with its surrounding whitespace
#[derive(Debug, Clone)]
pub struct BinaryOperator {
    pub whitespace_before: BaseWhitespace,
    pub value: String,
    pub whitespace_after: BaseWhitespace,
}

impl BinaryOperator {
    /// `value` surrounded by single spaces
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            whitespace_before: BaseWhitespace::space(),
            value: value.into(),
            whitespace_after: BaseWhitespace::space(),
        }
    }
}

impl CstNode for BinaryOperator {
    const KIND: NodeKind = NodeKind::BinaryOperator;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::trivia("whitespace_before").defaults_to(" "),
        FieldSpec::scalar("value"),
        FieldSpec::trivia("whitespace_after").defaults_to(" "),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "whitespace_before" => Some(self.whitespace_before.clone().into()),
            "value" => Some(self.value.clone().into()),
            "whitespace_after" => Some(self.whitespace_after.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "whitespace_before" => {
                self.whitespace_before = value.into_whitespace(Self::KIND, spec)?
            }
            "value" => self.value = value.into_text(Self::KIND, spec)?,
            "whitespace_after" => self.whitespace_after = value.into_whitespace(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, _f: &mut dyn FnMut(&Node) -> Node) {}

    fn validate(&self) -> Result<()> {
        if !BINARY_OPERATORS.contains(&self.value.as_str()) {
            return Err(CstError::invalid_node(
                Self::KIND,
                format!("'{}' is not a binary operator", self.value),
            ));
        }
        check_trivia(Self::KIND, self.whitespace_before.validate())?;
        check_trivia(Self::KIND, self.whitespace_after.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        self.whitespace_before.codegen(state);
        state.add_token(&self.value);
        self.whitespace_after.codegen(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AssignEqual, Comma};

    fn name(value: &str) -> Node {
        Name::new(value).build().unwrap()
    }

    #[test]
    fn test_literal_validation() {
        assert!(Name::new("").build().is_err());
        assert!(Name::new("1x").build().is_err());
        assert!(Name::new("_ok1").build().is_ok());
        assert!(Integer::new("12").build().is_ok());
        assert!(Float::new(".5").build().is_ok());
        assert!(SimpleString::new("'hi'").build().is_ok());
        assert!(SimpleString::new("rb\"raw\"").build().is_ok());
        assert!(SimpleString::new("hi").build().is_err());
        assert!(SimpleString::new("'open").build().is_err());
    }

    #[test]
    fn test_call_synthesizes_commas_between_args() {
        let args = vec![
            Arg::new(name("a")).build().unwrap(),
            Arg::keyword(name("sep"), SimpleString::new("''").build().unwrap())
                .build()
                .unwrap(),
        ];
        let call = Call::new(name("print"), args).build().unwrap();
        assert_eq!(call.code(), "print(a, sep='')");
    }

    #[test]
    fn test_present_comma_on_last_arg_is_kept() {
        let arg = Arg {
            comma: MaybeSentinel::Present(Comma::default().build().unwrap()),
            ..Arg::new(name("a"))
        }
        .build()
        .unwrap();
        let call = Call::new(name("f"), vec![arg]).build().unwrap();
        assert_eq!(call.code(), "f(a,)");
    }

    #[test]
    fn test_arg_equal_requires_keyword() {
        let err = Arg {
            equal: MaybeSentinel::Present(AssignEqual::default().build().unwrap()),
            ..Arg::new(name("a"))
        }
        .build()
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Arg node: Must have a keyword when specifying an AssignEqual."
        );
    }

    #[test]
    fn test_binary_operator_validation() {
        assert!(BinaryOperator::new("+").build().is_ok());
        assert!(BinaryOperator::new("<>").build().is_err());

        let op = BinaryOperation::new(
            name("a"),
            BinaryOperator::new("*").build().unwrap(),
            Integer::new("2").build().unwrap(),
        )
        .build()
        .unwrap();
        assert_eq!(op.code(), "a * 2");
    }
}
