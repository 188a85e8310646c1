use winnow::combinator::{alt, delimited, preceded, repeat};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use super::sexpr::SExpr;

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

// -- Atoms ------------------------------------------------------------------

fn quoted(input: &mut &str) -> ModalResult<String> {
    let quote = alt(('"', '\'')).parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            c if c == quote => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                if esc != quote && esc != '\\' {
                    s.push('\\');
                }
                s.push(esc);
            }
            c => s.push(c),
        }
    }
}

fn bare<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| !c.is_whitespace() && c != '(' && c != ')').parse_next(input)
}

// -- Lists ------------------------------------------------------------------

fn list(input: &mut &str) -> ModalResult<SExpr> {
    let items: Vec<SExpr> =
        delimited('(', repeat(0.., preceded(ws, sexpr)), (ws, ')')).parse_next(input)?;
    Ok(SExpr::List(items))
}

fn sexpr(input: &mut &str) -> ModalResult<SExpr> {
    alt((
        list,
        quoted.map(SExpr::Atom),
        bare.map(|s: &str| SExpr::Atom(s.to_owned())),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

// -- Top level --------------------------------------------------------------

pub fn parse_expression(input: &mut &str) -> ModalResult<SExpr> {
    delimited(ws, sexpr, ws).parse_next(input)
}
