//! Statement nodes and the module root

use super::{
    Accepts, CstNode, FieldSpec, FieldValue, Node, NodeKind, check_form_feed, check_lines,
    check_trivia, codegen_separator, map_all, map_maybe, map_optional,
};
use crate::codegen::{CodegenContext, CodegenState};
use crate::error::CstError;
use crate::result::Result;
use crate::sentinel::MaybeSentinel;
use crate::trivia::{BaseWhitespace, EmptyLine, SimpleWhitespace, TrailingWhitespace};

const LEADING_LINES: FieldSpec = FieldSpec::trivia("leading_lines");
/// Blanks up to a form feed that resets the indentation column of a line
const FORM_FEED: FieldSpec = FieldSpec::trivia("form_feed");
const SEMICOLON: FieldSpec = FieldSpec::maybe("semicolon", Accepts::Kind(NodeKind::Semicolon));

/// Root of a parsed source file
#[derive(Debug, Clone)]
pub struct Module {
    pub header: Vec<EmptyLine>,
    pub body: Vec<Node>,
    pub footer: Vec<EmptyLine>,
    pub encoding: String,
    pub default_indent: String,
    pub default_newline: String,
    pub has_trailing_newline: bool,
}

impl Default for Module {
    fn default() -> Self {
        Self {
            header: Vec::new(),
            body: Vec::new(),
            footer: Vec::new(),
            encoding: "utf-8".to_string(),
            default_indent: "    ".to_string(),
            default_newline: "\n".to_string(),
            has_trailing_newline: true,
        }
    }
}

impl Module {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    /// Render the whole module
    pub fn code(&self) -> String {
        let mut state = CodegenState::for_module(self);
        self.codegen(&mut state, CodegenContext::default());
        state.finish()
    }

    /// Render `node` with this module's default indent and newline
    pub fn code_for_node(&self, node: &Node) -> String {
        let mut state = CodegenState::for_module(self);
        node.codegen(&mut state, CodegenContext::default());
        state.finish()
    }

    /// Rendered bytes, with a byte order mark for `utf-8-sig`
    pub fn bytes(&self) -> Vec<u8> {
        let code = self.code();
        if self.encoding == "utf-8-sig" {
            let mut bytes = Vec::with_capacity(code.len() + 3);
            bytes.extend_from_slice(b"\xef\xbb\xbf");
            bytes.extend_from_slice(code.as_bytes());
            bytes
        } else {
            code.into_bytes()
        }
    }
}

impl CstNode for Module {
    const KIND: NodeKind = NodeKind::Module;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::trivia("header"),
        FieldSpec::body("body", Accepts::Statement),
        FieldSpec::trivia("footer"),
        FieldSpec::scalar("encoding").defaults_to("utf-8"),
        FieldSpec::scalar("default_indent").defaults_to("    "),
        FieldSpec::scalar("default_newline").defaults_to("\n"),
        FieldSpec::scalar("has_trailing_newline").defaults_to("true"),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "header" => Some(self.header.clone().into()),
            "body" => Some(self.body.clone().into()),
            "footer" => Some(self.footer.clone().into()),
            "encoding" => Some(self.encoding.clone().into()),
            "default_indent" => Some(self.default_indent.clone().into()),
            "default_newline" => Some(self.default_newline.clone().into()),
            "has_trailing_newline" => Some(self.has_trailing_newline.into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "header" => self.header = value.into_empty_lines(Self::KIND, spec)?,
            "body" => self.body = value.into_nodes(Self::KIND, spec)?,
            "footer" => self.footer = value.into_empty_lines(Self::KIND, spec)?,
            "encoding" => self.encoding = value.into_text(Self::KIND, spec)?,
            "default_indent" => self.default_indent = value.into_text(Self::KIND, spec)?,
            "default_newline" => self.default_newline = value.into_text(Self::KIND, spec)?,
            "has_trailing_newline" => {
                self.has_trailing_newline = value.into_flag(Self::KIND, spec)?
            }
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.body, f);
    }

    fn validate(&self) -> Result<()> {
        if self.default_indent.is_empty() || !self.default_indent.chars().all(|c| c == ' ' || c == '\t')
        {
            return Err(CstError::invalid_node(
                Self::KIND,
                "default_indent must be non-empty spaces or tabs",
            ));
        }
        if !matches!(self.default_newline.as_str(), "\n" | "\r\n" | "\r") {
            return Err(CstError::invalid_node(
                Self::KIND,
                format!("invalid default newline {:?}", self.default_newline),
            ));
        }
        check_lines(Self::KIND, &self.header)?;
        check_lines(Self::KIND, &self.footer)
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        for line in &self.header {
            line.codegen(state);
        }
        for statement in &self.body {
            statement.codegen(state, CodegenContext::default());
        }
        for line in &self.footer {
            line.codegen(state);
        }
        if self.has_trailing_newline {
            if state.is_empty() {
                state.add_newline(None);
            }
        } else {
            state.pop_trailing_newline();
        }
    }
}

/// One line of small statements separated by semicolons
#[derive(Debug, Clone, Default)]
pub struct SimpleStatementLine {
    pub leading_lines: Vec<EmptyLine>,
    pub form_feed: SimpleWhitespace,
    pub body: Vec<Node>,
    pub trailing_whitespace: TrailingWhitespace,
}

impl SimpleStatementLine {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }
}

impl CstNode for SimpleStatementLine {
    const KIND: NodeKind = NodeKind::SimpleStatementLine;
    const FIELDS: &'static [FieldSpec] = &[
        LEADING_LINES,
        FORM_FEED,
        FieldSpec::sequence("body", Accepts::SmallStatement),
        FieldSpec::trivia("trailing_whitespace"),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "leading_lines" => Some(self.leading_lines.clone().into()),
            "form_feed" => Some(self.form_feed.clone().into()),
            "body" => Some(self.body.clone().into()),
            "trailing_whitespace" => Some(self.trailing_whitespace.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "leading_lines" => self.leading_lines = value.into_empty_lines(Self::KIND, spec)?,
            "form_feed" => self.form_feed = value.into_simple_whitespace(Self::KIND, spec)?,
            "body" => self.body = value.into_nodes(Self::KIND, spec)?,
            "trailing_whitespace" => {
                self.trailing_whitespace = value.into_trailing_whitespace(Self::KIND, spec)?
            }
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.body, f);
    }

    fn validate(&self) -> Result<()> {
        check_lines(Self::KIND, &self.leading_lines)?;
        check_form_feed(Self::KIND, &self.form_feed)?;
        check_trivia(Self::KIND, self.trailing_whitespace.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        for line in &self.leading_lines {
            line.codegen(state);
        }
        self.form_feed.codegen(state);
        state.add_indent_tokens();
        state.mark_start();
        if self.body.is_empty() {
            state.add_token("pass");
        } else {
            let last = self.body.len() - 1;
            for (idx, statement) in self.body.iter().enumerate() {
                statement.codegen(state, CodegenContext::separated(idx < last));
            }
        }
        state.mark_end();
        self.trailing_whitespace.codegen(state);
    }
}

/// `def name(params): body`
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub leading_lines: Vec<EmptyLine>,
    pub form_feed: SimpleWhitespace,
    pub whitespace_after_def: SimpleWhitespace,
    pub name: Node,
    pub whitespace_after_name: SimpleWhitespace,
    pub whitespace_before_params: BaseWhitespace,
    pub params: Node,
    pub whitespace_before_colon: SimpleWhitespace,
    pub body: Node,
}

impl FunctionDef {
    pub fn new(name: Node, params: Node, body: Node) -> Self {
        Self {
            leading_lines: Vec::new(),
            form_feed: SimpleWhitespace::empty(),
            whitespace_after_def: SimpleWhitespace::space(),
            name,
            whitespace_after_name: SimpleWhitespace::empty(),
            whitespace_before_params: BaseWhitespace::empty(),
            params,
            whitespace_before_colon: SimpleWhitespace::empty(),
            body,
        }
    }
}

impl CstNode for FunctionDef {
    const KIND: NodeKind = NodeKind::FunctionDef;
    const FIELDS: &'static [FieldSpec] = &[
        LEADING_LINES,
        FORM_FEED,
        FieldSpec::trivia("whitespace_after_def").defaults_to(" "),
        FieldSpec::required("name", Accepts::Kind(NodeKind::Name)),
        FieldSpec::trivia("whitespace_after_name"),
        FieldSpec::trivia("whitespace_before_params"),
        FieldSpec::required("params", Accepts::Kind(NodeKind::Parameters)),
        FieldSpec::trivia("whitespace_before_colon"),
        FieldSpec::required("body", Accepts::Kind(NodeKind::IndentedBlock)),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "leading_lines" => Some(self.leading_lines.clone().into()),
            "form_feed" => Some(self.form_feed.clone().into()),
            "whitespace_after_def" => Some(self.whitespace_after_def.clone().into()),
            "name" => Some(self.name.clone().into()),
            "whitespace_after_name" => Some(self.whitespace_after_name.clone().into()),
            "whitespace_before_params" => Some(self.whitespace_before_params.clone().into()),
            "params" => Some(self.params.clone().into()),
            "whitespace_before_colon" => Some(self.whitespace_before_colon.clone().into()),
            "body" => Some(self.body.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "leading_lines" => self.leading_lines = value.into_empty_lines(Self::KIND, spec)?,
            "form_feed" => self.form_feed = value.into_simple_whitespace(Self::KIND, spec)?,
            "whitespace_after_def" => {
                self.whitespace_after_def = value.into_simple_whitespace(Self::KIND, spec)?
            }
            "name" => self.name = value.into_node(Self::KIND, spec)?,
            "whitespace_after_name" => {
                self.whitespace_after_name = value.into_simple_whitespace(Self::KIND, spec)?
            }
            "whitespace_before_params" => {
                self.whitespace_before_params = value.into_whitespace(Self::KIND, spec)?
            }
            "params" => self.params = value.into_node(Self::KIND, spec)?,
            "whitespace_before_colon" => {
                self.whitespace_before_colon = value.into_simple_whitespace(Self::KIND, spec)?
            }
            "body" => self.body = value.into_node(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        self.name = f(&self.name);
        self.params = f(&self.params);
        self.body = f(&self.body);
    }

    fn validate(&self) -> Result<()> {
        if self.whitespace_after_def.is_empty() {
            return Err(CstError::invalid_node(
                Self::KIND,
                "Must have at least one space after 'def'.",
            ));
        }
        check_lines(Self::KIND, &self.leading_lines)?;
        check_form_feed(Self::KIND, &self.form_feed)?;
        check_trivia(Self::KIND, self.whitespace_after_def.validate())?;
        check_trivia(Self::KIND, self.whitespace_after_name.validate())?;
        check_trivia(Self::KIND, self.whitespace_before_params.validate())?;
        check_trivia(Self::KIND, self.whitespace_before_colon.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        for line in &self.leading_lines {
            line.codegen(state);
        }
        self.form_feed.codegen(state);
        state.add_indent_tokens();
        state.mark_start();
        state.add_token("def");
        self.whitespace_after_def.codegen(state);
        self.name.codegen(state, CodegenContext::default());
        self.whitespace_after_name.codegen(state);
        state.add_token("(");
        self.whitespace_before_params.codegen(state);
        self.params.codegen(state, CodegenContext::default());
        state.add_token(")");
        self.whitespace_before_colon.codegen(state);
        state.add_token(":");
        self.body.codegen(state, CodegenContext::default());
    }
}

/// The parameter list of a [`FunctionDef`]
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    pub params: Vec<Node>,
}

impl Parameters {
    pub fn new(params: Vec<Node>) -> Self {
        Self { params }
    }
}

impl CstNode for Parameters {
    const KIND: NodeKind = NodeKind::Parameters;
    const FIELDS: &'static [FieldSpec] =
        &[FieldSpec::sequence("params", Accepts::Kind(NodeKind::Param))];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        (name == "params").then(|| self.params.clone().into())
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        self.params = value.into_nodes(Self::KIND, spec)?;
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.params, f);
    }

    fn validate(&self) -> Result<()> {
        let mut seen_default = false;
        for param in self.params.iter().filter_map(Node::as_param) {
            if param.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(CstError::invalid_node(
                    Self::KIND,
                    "Cannot have param without defaults following a param with defaults.",
                ));
            }
        }
        Ok(())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        let last = self.params.len().saturating_sub(1);
        for (idx, param) in self.params.iter().enumerate() {
            param.codegen(state, CodegenContext::separated(idx < last));
        }
    }
}

/// One parameter, optionally with a default value
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Node,
    pub equal: MaybeSentinel<Node>,
    pub default: Option<Node>,
    pub comma: MaybeSentinel<Node>,
    pub whitespace_after_param: BaseWhitespace,
}

impl Param {
    pub fn new(name: Node) -> Self {
        Self {
            name,
            equal: MaybeSentinel::Default,
            default: None,
            comma: MaybeSentinel::Default,
            whitespace_after_param: BaseWhitespace::empty(),
        }
    }
}

impl CstNode for Param {
    const KIND: NodeKind = NodeKind::Param;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", Accepts::Kind(NodeKind::Name)),
        FieldSpec::maybe("equal", Accepts::Kind(NodeKind::AssignEqual)),
        FieldSpec::optional("default", Accepts::Expression),
        FieldSpec::maybe("comma", Accepts::Kind(NodeKind::Comma)),
        FieldSpec::trivia("whitespace_after_param"),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            "equal" => Some(self.equal.clone().into()),
            "default" => Some(self.default.clone().into()),
            "comma" => Some(self.comma.clone().into()),
            "whitespace_after_param" => Some(self.whitespace_after_param.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "name" => self.name = value.into_node(Self::KIND, spec)?,
            "equal" => self.equal = value.into_maybe_node(Self::KIND, spec)?,
            "default" => self.default = value.into_optional_node(Self::KIND, spec)?,
            "comma" => self.comma = value.into_maybe_node(Self::KIND, spec)?,
            "whitespace_after_param" => {
                self.whitespace_after_param = value.into_whitespace(Self::KIND, spec)?
            }
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        self.name = f(&self.name);
        map_maybe(&mut self.equal, f);
        map_optional(&mut self.default, f);
        map_maybe(&mut self.comma, f);
    }

    fn validate(&self) -> Result<()> {
        if self.default.is_none() && !self.equal.is_default() {
            return Err(CstError::invalid_node(
                Self::KIND,
                "Must have a default when specifying an AssignEqual.",
            ));
        }
        check_trivia(Self::KIND, self.whitespace_after_param.validate())
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        self.name.codegen(state, CodegenContext::default());
        if let Some(default) = &self.default {
            match &self.equal {
                MaybeSentinel::Present(equal) => equal.codegen(state, CodegenContext::default()),
                MaybeSentinel::Default => state.add_token("="),
            }
            default.codegen(state, CodegenContext::default());
        }
        codegen_separator(&self.comma, ", ", state, ctx);
        self.whitespace_after_param.codegen(state);
    }
}

/// An indented suite of statements following a `:`
#[derive(Debug, Clone, Default)]
pub struct IndentedBlock {
    pub header: TrailingWhitespace,
    /// Indentation relative to the parent; `None` uses the module default
    pub indent: Option<String>,
    pub body: Vec<Node>,
    pub footer: Vec<EmptyLine>,
}

impl IndentedBlock {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }
}

impl CstNode for IndentedBlock {
    const KIND: NodeKind = NodeKind::IndentedBlock;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::trivia("header"),
        FieldSpec::scalar("indent"),
        FieldSpec::body("body", Accepts::Statement),
        FieldSpec::trivia("footer"),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "header" => Some(self.header.clone().into()),
            "indent" => Some(self.indent.clone().into()),
            "body" => Some(self.body.clone().into()),
            "footer" => Some(self.footer.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "header" => self.header = value.into_trailing_whitespace(Self::KIND, spec)?,
            "indent" => self.indent = value.into_optional_text(Self::KIND, spec)?,
            "body" => self.body = value.into_nodes(Self::KIND, spec)?,
            "footer" => self.footer = value.into_empty_lines(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.body, f);
    }

    fn validate(&self) -> Result<()> {
        if let Some(indent) = &self.indent
            && (indent.is_empty() || !indent.chars().all(|c| c == ' ' || c == '\t'))
        {
            return Err(CstError::invalid_node(
                Self::KIND,
                "An indented block must have a non-empty indent made of spaces or tabs.",
            ));
        }
        check_trivia(Self::KIND, self.header.validate())?;
        check_lines(Self::KIND, &self.footer)
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        self.header.codegen(state);
        state.increase_indent(self.indent.as_deref());
        if self.body.is_empty() {
            state.add_indent_tokens();
            state.add_token("pass");
            state.add_newline(None);
        } else {
            for statement in &self.body {
                statement.codegen(state, CodegenContext::default());
            }
        }
        for line in &self.footer {
            line.codegen(state);
        }
        state.decrease_indent();
    }
}

/// `if test: body` with an optional `elif`/`else` chain
#[derive(Debug, Clone)]
pub struct If {
    pub leading_lines: Vec<EmptyLine>,
    pub form_feed: SimpleWhitespace,
    pub whitespace_before_test: SimpleWhitespace,
    pub test: Node,
    pub whitespace_after_test: SimpleWhitespace,
    pub body: Node,
    /// Either another `If` (rendered as `elif`) or an `Else`
    pub orelse: Option<Node>,
}

impl If {
    pub fn new(test: Node, body: Node) -> Self {
        Self {
            leading_lines: Vec::new(),
            form_feed: SimpleWhitespace::empty(),
            whitespace_before_test: SimpleWhitespace::space(),
            test,
            whitespace_after_test: SimpleWhitespace::empty(),
            body,
            orelse: None,
        }
    }
}

impl CstNode for If {
    const KIND: NodeKind = NodeKind::If;
    const FIELDS: &'static [FieldSpec] = &[
        LEADING_LINES,
        FORM_FEED,
        FieldSpec::trivia("whitespace_before_test").defaults_to(" "),
        FieldSpec::required("test", Accepts::Expression),
        FieldSpec::trivia("whitespace_after_test"),
        FieldSpec::required("body", Accepts::Kind(NodeKind::IndentedBlock)),
        FieldSpec::optional("orelse", Accepts::OrElse),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "leading_lines" => Some(self.leading_lines.clone().into()),
            "form_feed" => Some(self.form_feed.clone().into()),
            "whitespace_before_test" => Some(self.whitespace_before_test.clone().into()),
            "test" => Some(self.test.clone().into()),
            "whitespace_after_test" => Some(self.whitespace_after_test.clone().into()),
            "body" => Some(self.body.clone().into()),
            "orelse" => Some(self.orelse.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "leading_lines" => self.leading_lines = value.into_empty_lines(Self::KIND, spec)?,
            "form_feed" => self.form_feed = value.into_simple_whitespace(Self::KIND, spec)?,
            "whitespace_before_test" => {
                self.whitespace_before_test = value.into_simple_whitespace(Self::KIND, spec)?
            }
            "test" => self.test = value.into_node(Self::KIND, spec)?,
            "whitespace_after_test" => {
                self.whitespace_after_test = value.into_simple_whitespace(Self::KIND, spec)?
            }
            "body" => self.body = value.into_node(Self::KIND, spec)?,
            "orelse" => self.orelse = value.into_optional_node(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        self.test = f(&self.test);
        self.body = f(&self.body);
        map_optional(&mut self.orelse, f);
    }

    fn validate(&self) -> Result<()> {
        if self.whitespace_before_test.is_empty() && !self.test.safe_after_keyword() {
            return Err(CstError::invalid_node(
                Self::KIND,
                "Must have at least one space after 'if' keyword.",
            ));
        }
        check_lines(Self::KIND, &self.leading_lines)?;
        check_form_feed(Self::KIND, &self.form_feed)?;
        check_trivia(Self::KIND, self.whitespace_before_test.validate())?;
        check_trivia(Self::KIND, self.whitespace_after_test.validate())
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        for line in &self.leading_lines {
            line.codegen(state);
        }
        self.form_feed.codegen(state);
        state.add_indent_tokens();
        state.mark_start();
        state.add_token(if ctx.is_elif { "elif" } else { "if" });
        self.whitespace_before_test.codegen(state);
        self.test.codegen(state, CodegenContext::default());
        self.whitespace_after_test.codegen(state);
        state.add_token(":");
        self.body.codegen(state, CodegenContext::default());
        if let Some(orelse) = &self.orelse {
            orelse.codegen(state, CodegenContext::elif());
        }
    }
}

/// `else: body`
#[derive(Debug, Clone)]
pub struct Else {
    pub leading_lines: Vec<EmptyLine>,
    pub form_feed: SimpleWhitespace,
    pub whitespace_before_colon: SimpleWhitespace,
    pub body: Node,
}

impl Else {
    pub fn new(body: Node) -> Self {
        Self {
            leading_lines: Vec::new(),
            form_feed: SimpleWhitespace::empty(),
            whitespace_before_colon: SimpleWhitespace::empty(),
            body,
        }
    }
}

impl CstNode for Else {
    const KIND: NodeKind = NodeKind::Else;
    const FIELDS: &'static [FieldSpec] = &[
        LEADING_LINES,
        FORM_FEED,
        FieldSpec::trivia("whitespace_before_colon"),
        FieldSpec::required("body", Accepts::Kind(NodeKind::IndentedBlock)),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "leading_lines" => Some(self.leading_lines.clone().into()),
            "form_feed" => Some(self.form_feed.clone().into()),
            "whitespace_before_colon" => Some(self.whitespace_before_colon.clone().into()),
            "body" => Some(self.body.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "leading_lines" => self.leading_lines = value.into_empty_lines(Self::KIND, spec)?,
            "form_feed" => self.form_feed = value.into_simple_whitespace(Self::KIND, spec)?,
            "whitespace_before_colon" => {
                self.whitespace_before_colon = value.into_simple_whitespace(Self::KIND, spec)?
            }
            "body" => self.body = value.into_node(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        self.body = f(&self.body);
    }

    fn validate(&self) -> Result<()> {
        check_lines(Self::KIND, &self.leading_lines)?;
        check_form_feed(Self::KIND, &self.form_feed)?;
        check_trivia(Self::KIND, self.whitespace_before_colon.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        for line in &self.leading_lines {
            line.codegen(state);
        }
        self.form_feed.codegen(state);
        state.add_indent_tokens();
        state.mark_start();
        state.add_token("else");
        self.whitespace_before_colon.codegen(state);
        state.add_token(":");
        self.body.codegen(state, CodegenContext::default());
    }
}

/// An expression used as a statement
#[derive(Debug, Clone)]
pub struct Expr {
    pub value: Node,
    pub semicolon: MaybeSentinel<Node>,
}

impl Expr {
    pub fn new(value: Node) -> Self {
        Self {
            value,
            semicolon: MaybeSentinel::Default,
        }
    }
}

impl CstNode for Expr {
    const KIND: NodeKind = NodeKind::Expr;
    const FIELDS: &'static [FieldSpec] =
        &[FieldSpec::required("value", Accepts::Expression), SEMICOLON];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "value" => Some(self.value.clone().into()),
            "semicolon" => Some(self.semicolon.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "value" => self.value = value.into_node(Self::KIND, spec)?,
            "semicolon" => self.semicolon = value.into_maybe_node(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        self.value = f(&self.value);
        map_maybe(&mut self.semicolon, f);
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        self.value.codegen(state, CodegenContext::default());
        codegen_separator(&self.semicolon, "; ", state, ctx);
    }
}

/// `return [value]`
#[derive(Debug, Clone, Default)]
pub struct Return {
    pub whitespace_after_return: MaybeSentinel<SimpleWhitespace>,
    pub value: Option<Node>,
    pub semicolon: MaybeSentinel<Node>,
}

impl Return {
    pub fn new(value: Option<Node>) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

impl CstNode for Return {
    const KIND: NodeKind = NodeKind::Return;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::trivia("whitespace_after_return"),
        FieldSpec::optional("value", Accepts::Expression),
        SEMICOLON,
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "whitespace_after_return" => Some(self.whitespace_after_return.clone().into()),
            "value" => Some(self.value.clone().into()),
            "semicolon" => Some(self.semicolon.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "whitespace_after_return" => {
                self.whitespace_after_return = value.into_maybe_whitespace(Self::KIND, spec)?
            }
            "value" => self.value = value.into_optional_node(Self::KIND, spec)?,
            "semicolon" => self.semicolon = value.into_maybe_node(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_optional(&mut self.value, f);
        map_maybe(&mut self.semicolon, f);
    }

    fn validate(&self) -> Result<()> {
        if let MaybeSentinel::Present(ws) = &self.whitespace_after_return {
            if ws.is_empty()
                && self
                    .value
                    .as_ref()
                    .is_some_and(|value| !value.safe_after_keyword())
            {
                return Err(CstError::invalid_node(
                    Self::KIND,
                    "Must have at least one space after 'return'.",
                ));
            }
            check_trivia(Self::KIND, ws.validate())?;
        }
        Ok(())
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        state.add_token("return");
        match &self.whitespace_after_return {
            MaybeSentinel::Present(ws) => ws.codegen(state),
            MaybeSentinel::Default if self.value.is_some() => state.add_token(" "),
            MaybeSentinel::Default => {}
        }
        if let Some(value) = &self.value {
            value.codegen(state, CodegenContext::default());
        }
        codegen_separator(&self.semicolon, "; ", state, ctx);
    }
}

/// `pass`
#[derive(Debug, Clone, Default)]
pub struct Pass {
    pub semicolon: MaybeSentinel<Node>,
}

impl CstNode for Pass {
    const KIND: NodeKind = NodeKind::Pass;
    const FIELDS: &'static [FieldSpec] = &[SEMICOLON];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        (name == "semicolon").then(|| self.semicolon.clone().into())
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        self.semicolon = value.into_maybe_node(Self::KIND, spec)?;
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_maybe(&mut self.semicolon, f);
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        state.add_token("pass");
        codegen_separator(&self.semicolon, "; ", state, ctx);
    }
}

/// `target = [target = ...] value`
#[derive(Debug, Clone)]
pub struct Assign {
    pub targets: Vec<Node>,
    pub value: Node,
    pub semicolon: MaybeSentinel<Node>,
}

impl Assign {
    pub fn new(targets: Vec<Node>, value: Node) -> Self {
        Self {
            targets,
            value,
            semicolon: MaybeSentinel::Default,
        }
    }
}

impl CstNode for Assign {
    const KIND: NodeKind = NodeKind::Assign;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::sequence("targets", Accepts::Kind(NodeKind::AssignTarget)),
        FieldSpec::required("value", Accepts::Expression),
        SEMICOLON,
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "targets" => Some(self.targets.clone().into()),
            "value" => Some(self.value.clone().into()),
            "semicolon" => Some(self.semicolon.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "targets" => self.targets = value.into_nodes(Self::KIND, spec)?,
            "value" => self.value = value.into_node(Self::KIND, spec)?,
            "semicolon" => self.semicolon = value.into_maybe_node(Self::KIND, spec)?,
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        map_all(&mut self.targets, f);
        self.value = f(&self.value);
        map_maybe(&mut self.semicolon, f);
    }

    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(CstError::invalid_node(
                Self::KIND,
                "An Assign must have at least one AssignTarget.",
            ));
        }
        Ok(())
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        for target in &self.targets {
            target.codegen(state, CodegenContext::default());
        }
        self.value.codegen(state, CodegenContext::default());
        codegen_separator(&self.semicolon, "; ", state, ctx);
    }
}

/// `target =` inside an [`Assign`]
#[derive(Debug, Clone)]
pub struct AssignTarget {
    pub target: Node,
    pub whitespace_before_equal: SimpleWhitespace,
    pub whitespace_after_equal: SimpleWhitespace,
}

impl AssignTarget {
    pub fn new(target: Node) -> Self {
        Self {
            target,
            whitespace_before_equal: SimpleWhitespace::space(),
            whitespace_after_equal: SimpleWhitespace::space(),
        }
    }
}

impl CstNode for AssignTarget {
    const KIND: NodeKind = NodeKind::AssignTarget;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("target", Accepts::Expression),
        FieldSpec::trivia("whitespace_before_equal").defaults_to(" "),
        FieldSpec::trivia("whitespace_after_equal").defaults_to(" "),
    ];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "target" => Some(self.target.clone().into()),
            "whitespace_before_equal" => Some(self.whitespace_before_equal.clone().into()),
            "whitespace_after_equal" => Some(self.whitespace_after_equal.clone().into()),
            _ => None,
        }
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        match spec.name {
            "target" => self.target = value.into_node(Self::KIND, spec)?,
            "whitespace_before_equal" => {
                self.whitespace_before_equal = value.into_simple_whitespace(Self::KIND, spec)?
            }
            "whitespace_after_equal" => {
                self.whitespace_after_equal = value.into_simple_whitespace(Self::KIND, spec)?
            }
            other => return Err(CstError::invalid_field(Self::KIND, other)),
        }
        Ok(())
    }

    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node) {
        self.target = f(&self.target);
    }

    fn validate(&self) -> Result<()> {
        check_trivia(Self::KIND, self.whitespace_before_equal.validate())?;
        check_trivia(Self::KIND, self.whitespace_after_equal.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        self.target.codegen(state, CodegenContext::default());
        self.whitespace_before_equal.codegen(state);
        state.add_token("=");
        self.whitespace_after_equal.codegen(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Call, Integer, Name, SimpleString};

    fn name(value: &str) -> Node {
        Name::new(value).build().unwrap()
    }

    fn line(body: Vec<Node>) -> Node {
        SimpleStatementLine::new(body).build().unwrap()
    }

    #[test]
    fn test_return_default_whitespace() {
        let bare = Return::new(None).build().unwrap();
        assert_eq!(bare.code(), "return");

        let with_value = Return::new(Some(name("x"))).build().unwrap();
        assert_eq!(with_value.code(), "return x");
    }

    #[test]
    fn test_return_requires_space_before_plain_value() {
        let err = Return {
            whitespace_after_return: MaybeSentinel::Present(SimpleWhitespace::empty()),
            value: Some(name("x")),
            semicolon: MaybeSentinel::Default,
        }
        .build()
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Return node: Must have at least one space after 'return'."
        );

        let quoted = Return {
            whitespace_after_return: MaybeSentinel::Present(SimpleWhitespace::empty()),
            value: Some(SimpleString::new("'x'").build().unwrap()),
            semicolon: MaybeSentinel::Default,
        }
        .build()
        .unwrap();
        assert_eq!(quoted.code(), "return'x'");
    }

    #[test]
    fn test_semicolons_synthesized_between_small_statements() {
        let print = Expr::new(Call::new(name("print"), vec![]).build().unwrap())
            .build()
            .unwrap();
        let ret = Return::new(None).build().unwrap();
        let module = Module::new(vec![line(vec![print, ret])]);
        assert_eq!(module.code(), "print(); return\n");
    }

    #[test]
    fn test_empty_bodies_render_pass() {
        let func = FunctionDef::new(
            name("f"),
            Parameters::default().build().unwrap(),
            IndentedBlock::default().build().unwrap(),
        )
        .build()
        .unwrap();
        let module = Module::new(vec![func, line(vec![])]);
        assert_eq!(module.code(), "def f():\n    pass\npass\n");
    }

    #[test]
    fn test_module_trailing_newline_handling() {
        let assign = Assign::new(
            vec![AssignTarget::new(name("x")).build().unwrap()],
            Integer::new("1").build().unwrap(),
        )
        .build()
        .unwrap();
        let module = Module {
            has_trailing_newline: false,
            ..Module::new(vec![line(vec![assign])])
        };
        assert_eq!(module.code(), "x = 1");

        assert_eq!(Module::new(vec![]).code(), "\n");
        let empty = Module {
            has_trailing_newline: false,
            ..Module::default()
        };
        assert_eq!(empty.code(), "");
    }

    #[test]
    fn test_if_elif_else_chain() {
        let body = || {
            IndentedBlock::new(vec![line(vec![Pass::default().build().unwrap()])])
                .build()
                .unwrap()
        };
        let otherwise = Else::new(body()).build().unwrap();
        let elif = If {
            orelse: Some(otherwise),
            ..If::new(name("b"), body())
        }
        .build()
        .unwrap();
        let root = If {
            orelse: Some(elif),
            ..If::new(name("a"), body())
        }
        .build()
        .unwrap();
        assert_eq!(
            Module::new(vec![root]).code(),
            "if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n"
        );
    }

    #[test]
    fn test_structural_validation() {
        assert!(Assign::new(vec![], name("x")).build().is_err());
        assert!(
            IndentedBlock {
                indent: Some("x".to_string()),
                ..IndentedBlock::default()
            }
            .build()
            .is_err()
        );
        assert!(
            If {
                whitespace_before_test: SimpleWhitespace::empty(),
                ..If::new(name("a"), IndentedBlock::default().build().unwrap())
            }
            .build()
            .is_err()
        );

        let with_default = Param {
            default: Some(Integer::new("1").build().unwrap()),
            ..Param::new(name("a"))
        }
        .build()
        .unwrap();
        let plain = Param::new(name("b")).build().unwrap();
        assert!(Parameters::new(vec![with_default, plain]).build().is_err());
    }
}
