#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Span;

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Syntax error: {message}")]
    #[diagnostic(code(gr1::parse::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Empty formula")]
    #[diagnostic(
        code(gr1::parse::empty),
        help("use `true` for a trivially satisfied predicate, or leave the section empty")
    )]
    Empty,
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, span: Span, source: &str, name: &str) -> Self {
        let len = span.end.saturating_sub(span.start);
        ParseError::Syntax {
            message: message.into(),
            span: (span.start, len).into(),
            src: miette::NamedSource::new(name, source.to_owned()),
        }
    }

    /// Byte span of the error inside the parsed source, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::Syntax { span, .. } => {
                Some(Span::new(span.offset(), span.offset() + span.len()))
            }
            ParseError::Empty => None,
        }
    }
}
