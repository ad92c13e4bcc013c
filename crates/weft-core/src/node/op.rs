//! Punctuation nodes: separators, assignment equals, parentheses and dots

use super::{CstNode, FieldSpec, FieldValue, Node, NodeKind, check_trivia};
use crate::codegen::{CodegenContext, CodegenState};
use crate::error::CstError;
use crate::result::Result;
use crate::trivia::{BaseWhitespace, SimpleWhitespace};

macro_rules! spaced_token {
    ($(#[$meta:meta])* $kind:ident, $text:literal, $ws:ty, $convert:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $kind {
            pub whitespace_before: $ws,
            pub whitespace_after: $ws,
        }

        impl $kind {
            /// One space after the token, none before
            pub fn spaced() -> Self {
                Self {
                    whitespace_before: <$ws>::default(),
                    whitespace_after: <$ws>::space(),
                }
            }
        }

        impl CstNode for $kind {
            const KIND: NodeKind = NodeKind::$kind;
            const FIELDS: &'static [FieldSpec] = &[
                FieldSpec::trivia("whitespace_before"),
                FieldSpec::trivia("whitespace_after"),
            ];

            fn get_field(&self, name: &str) -> Option<FieldValue> {
                match name {
                    "whitespace_before" => Some(self.whitespace_before.clone().into()),
                    "whitespace_after" => Some(self.whitespace_after.clone().into()),
                    _ => None,
                }
            }

            fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
                match spec.name {
                    "whitespace_before" => {
                        self.whitespace_before = value.$convert(Self::KIND, spec)?
                    }
                    "whitespace_after" => self.whitespace_after = value.$convert(Self::KIND, spec)?,
                    other => return Err(CstError::invalid_field(Self::KIND, other)),
                }
                Ok(())
            }

            fn map_children(&mut self, _f: &mut dyn FnMut(&Node) -> Node) {}

            fn validate(&self) -> Result<()> {
                check_trivia(Self::KIND, self.whitespace_before.validate())?;
                check_trivia(Self::KIND, self.whitespace_after.validate())
            }

            fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
                self.whitespace_before.codegen(state);
                state.add_token($text);
                self.whitespace_after.codegen(state);
            }
        }
    };
}

spaced_token!(
    /// `,` between arguments or parameters
    Comma, ",", BaseWhitespace, into_whitespace
);
spaced_token!(
    /// `;` between small statements on one line
    Semicolon, ";", SimpleWhitespace, into_simple_whitespace
);
spaced_token!(
    /// `=` between a keyword and its value, or a parameter and its default
    AssignEqual, "=", BaseWhitespace, into_whitespace
);
spaced_token!(
    /// `.` in an attribute access
    Dot, ".", BaseWhitespace, into_whitespace
);

/// `(` wrapping an expression
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeftParen {
    pub whitespace_after: BaseWhitespace,
}

impl CstNode for LeftParen {
    const KIND: NodeKind = NodeKind::LeftParen;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::trivia("whitespace_after")];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        (name == "whitespace_after").then(|| self.whitespace_after.clone().into())
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        self.whitespace_after = value.into_whitespace(Self::KIND, spec)?;
        Ok(())
    }

    fn map_children(&mut self, _f: &mut dyn FnMut(&Node) -> Node) {}

    fn validate(&self) -> Result<()> {
        check_trivia(Self::KIND, self.whitespace_after.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        state.add_token("(");
        self.whitespace_after.codegen(state);
    }
}

/// `)` closing a [`LeftParen`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RightParen {
    pub whitespace_before: BaseWhitespace,
}

impl CstNode for RightParen {
    const KIND: NodeKind = NodeKind::RightParen;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::trivia("whitespace_before")];

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        (name == "whitespace_before").then(|| self.whitespace_before.clone().into())
    }

    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()> {
        self.whitespace_before = value.into_whitespace(Self::KIND, spec)?;
        Ok(())
    }

    fn map_children(&mut self, _f: &mut dyn FnMut(&Node) -> Node) {}

    fn validate(&self) -> Result<()> {
        check_trivia(Self::KIND, self.whitespace_before.validate())
    }

    fn codegen(&self, state: &mut CodegenState, _ctx: CodegenContext) {
        self.whitespace_before.codegen(state);
        state.add_token(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_codegen() {
        assert_eq!(Comma::spaced().build().unwrap().code(), ", ");
        assert_eq!(Semicolon::default().build().unwrap().code(), ";");
        assert_eq!(
            AssignEqual {
                whitespace_before: BaseWhitespace::space(),
                whitespace_after: BaseWhitespace::space(),
            }
            .build()
            .unwrap()
            .code(),
            " = "
        );
    }

    #[test]
    fn test_semicolon_rejects_multiline_whitespace() {
        let err = Semicolon {
            whitespace_before: SimpleWhitespace::new("\n"),
            whitespace_after: SimpleWhitespace::empty(),
        }
        .build()
        .unwrap_err();
        assert!(matches!(err, CstError::InvalidNode { kind: NodeKind::Semicolon, .. }));
    }
}
