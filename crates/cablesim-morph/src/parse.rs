// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Textual label expressions.

Parsing happens in two passes: a `chumsky` reader turns the text into a
generic s-expression tree, then a typed evaluator maps each form onto the
region or locset constructors and checks arities and argument kinds.

```text
(join (tag 3) (distal-interval (locset "syn") 20))
(restrict (uniform (all) 0 99 42) (region "dend"))
```
*/

use crate::embedding::RadiusCmp;
use crate::error::{MorphError, MorphResult};
use crate::locset::Locset;
use crate::primitives::Location;
use crate::region::Region;
use chumsky::prelude::*;
use std::ops::Range;
use std::str::FromStr;

type Span = Range<usize>;

#[derive(Debug, Clone, PartialEq)]
enum SExpr {
    Int(i128),
    Real(f64),
    Symbol(String),
    Str(String),
    List(Vec<(SExpr, Span)>),
}

fn classify_atom(s: String) -> SExpr {
    // Wide enough for both signed branch ids and full-range u64 seeds
    if let Ok(i) = s.parse::<i128>() {
        return SExpr::Int(i);
    }
    let numeric = s
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    match s.parse::<f64>() {
        Ok(x) if numeric => SExpr::Real(x),
        _ => SExpr::Symbol(s),
    }
}

fn reader() -> impl Parser<char, (SExpr, Span), Error = Simple<char>> {
    recursive(|expr| {
        let string = just('"')
            .ignore_then(filter(|c: &char| *c != '"').repeated())
            .then_ignore(just('"'))
            .collect::<String>()
            .map(SExpr::Str);

        let atom = filter(|c: &char| !c.is_whitespace() && !matches!(c, '(' | ')' | '"'))
            .repeated()
            .at_least(1)
            .collect::<String>()
            .map(classify_atom);

        let list = just('(')
            .ignore_then(expr.padded().repeated())
            .then_ignore(text::whitespace())
            .then_ignore(just(')'))
            .map(SExpr::List);

        choice((list, string, atom)).map_with_span(|e, span: Span| (e, span))
    })
    .padded()
    .then_ignore(end())
}

fn read(input: &str) -> MorphResult<(SExpr, Span)> {
    reader().parse(input).map_err(|errors| {
        let first = errors.into_iter().next();
        MorphError::Parse {
            message: first
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "malformed expression".to_string()),
            position: first.map(|e| e.span().start).unwrap_or(0),
        }
    })
}

/// A parsed label: either algebra
#[derive(Debug, Clone, PartialEq)]
pub enum LabelExpression {
    Region(Region),
    Locset(Locset),
}

/// Evaluated value of a sub-expression
enum Value {
    Int(i128),
    Real(f64),
    Str(String),
    Region(Region),
    Locset(Locset),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Region(_) => "region",
            Value::Locset(_) => "locset",
        }
    }
}

fn parse_error(message: impl Into<String>, span: &Span) -> MorphError {
    MorphError::Parse {
        message: message.into(),
        position: span.start,
    }
}

type Arg = (Value, Span);

fn region_arg(arg: Arg) -> MorphResult<Region> {
    match arg {
        (Value::Region(r), _) => Ok(r),
        (Value::Str(name), _) => Ok(Region::named(name)),
        (v, span) => Err(parse_error(format!("expected region, found {}", v.kind()), &span)),
    }
}

fn locset_arg(arg: Arg) -> MorphResult<Locset> {
    match arg {
        (Value::Locset(l), _) => Ok(l),
        (Value::Str(name), _) => Ok(Locset::named(name)),
        (v, span) => Err(parse_error(format!("expected locset, found {}", v.kind()), &span)),
    }
}

fn real_arg(arg: &Arg) -> MorphResult<f64> {
    match arg {
        (Value::Real(x), _) => Ok(*x),
        (Value::Int(i), _) => Ok(*i as f64),
        (v, span) => Err(parse_error(format!("expected number, found {}", v.kind()), span)),
    }
}

fn int_arg<T: TryFrom<i128>>(arg: &Arg) -> MorphResult<T> {
    match arg {
        (Value::Int(i), span) => {
            T::try_from(*i).map_err(|_| parse_error(format!("integer {} out of range", i), span))
        }
        (v, span) => Err(parse_error(format!("expected integer, found {}", v.kind()), span)),
    }
}

fn string_arg(arg: Arg) -> MorphResult<String> {
    match arg {
        (Value::Str(s), _) => Ok(s),
        (v, span) => Err(parse_error(format!("expected string, found {}", v.kind()), &span)),
    }
}

fn with_span<T>(result: MorphResult<T>, span: &Span) -> MorphResult<T> {
    result.map_err(|e| match e {
        MorphError::Parse { .. } => e,
        other => parse_error(other.to_string(), span),
    })
}

/// Resolve the algebra of a variadic `join`/`intersect` from its arguments
fn is_locset_form(args: &[Arg], span: &Span) -> MorphResult<bool> {
    for (v, _) in args {
        match v {
            Value::Region(_) => return Ok(false),
            Value::Locset(_) => return Ok(true),
            _ => {}
        }
    }
    Err(parse_error("cannot tell region from locset arguments", span))
}

fn fold_regions(args: Vec<Arg>, op: fn(Region, Region) -> Region) -> MorphResult<Region> {
    let mut it = args.into_iter();
    let mut acc = match it.next() {
        Some(a) => region_arg(a)?,
        None => return Ok(Region::nil()),
    };
    for a in it {
        acc = op(acc, region_arg(a)?);
    }
    Ok(acc)
}

fn fold_locsets(args: Vec<Arg>, op: fn(Locset, Locset) -> Locset) -> MorphResult<Locset> {
    let mut it = args.into_iter();
    let mut acc = match it.next() {
        Some(a) => locset_arg(a)?,
        None => return Ok(Locset::nil()),
    };
    for a in it {
        acc = op(acc, locset_arg(a)?);
    }
    Ok(acc)
}

fn exact<const N: usize>(name: &str, args: Vec<Arg>, span: &Span) -> MorphResult<[Arg; N]> {
    let given = args.len();
    args.try_into().map_err(|_| {
        parse_error(
            format!("'{}' takes {} argument(s), {} given", name, N, given),
            span,
        )
    })
}

fn eval((expr, span): (SExpr, Span)) -> MorphResult<Value> {
    let items = match expr {
        SExpr::Int(i) => return Ok(Value::Int(i)),
        SExpr::Real(x) => return Ok(Value::Real(x)),
        SExpr::Str(s) => return Ok(Value::Str(s)),
        SExpr::Symbol(s) => return Err(parse_error(format!("unexpected symbol '{}'", s), &span)),
        SExpr::List(items) => items,
    };

    let mut items = items.into_iter();
    let name = match items.next() {
        Some((SExpr::Symbol(s), _)) => s,
        Some((_, head_span)) => return Err(parse_error("expected an operator name", &head_span)),
        None => return Err(parse_error("empty expression", &span)),
    };
    let args = items
        .map(|item| {
            let s = item.1.clone();
            eval(item).map(|v| (v, s))
        })
        .collect::<MorphResult<Vec<Arg>>>()?;
    let name = name.as_str();

    let value = match name {
        "region-nil" => {
            exact::<0>(name, args, &span)?;
            Value::Region(Region::nil())
        }
        "all" => {
            exact::<0>(name, args, &span)?;
            Value::Region(Region::all())
        }
        "cable" => {
            let [b, p, d] = exact::<3>(name, args, &span)?;
            let region = Region::cable(int_arg(&b)?, real_arg(&p)?, real_arg(&d)?);
            Value::Region(with_span(region, &span)?)
        }
        "branch" => {
            let [b] = exact::<1>(name, args, &span)?;
            Value::Region(Region::branch(int_arg(&b)?))
        }
        "segment" => {
            let [s] = exact::<1>(name, args, &span)?;
            Value::Region(Region::segment(int_arg(&s)?))
        }
        "tag" => {
            let [t] = exact::<1>(name, args, &span)?;
            Value::Region(Region::tagged(int_arg(&t)?))
        }
        "region" => {
            let [n] = exact::<1>(name, args, &span)?;
            Value::Region(Region::named(string_arg(n)?))
        }
        "distal-interval" => {
            let [ls, d] = exact::<2>(name, args, &span)?;
            let d = real_arg(&d)?;
            Value::Region(Region::distal_interval(locset_arg(ls)?, d))
        }
        "proximal-interval" => {
            let [ls, d] = exact::<2>(name, args, &span)?;
            let d = real_arg(&d)?;
            Value::Region(Region::proximal_interval(locset_arg(ls)?, d))
        }
        "radius-lt" | "radius-le" | "radius-gt" | "radius-ge" => {
            let op = match name {
                "radius-lt" => RadiusCmp::Lt,
                "radius-le" => RadiusCmp::Le,
                "radius-gt" => RadiusCmp::Gt,
                _ => RadiusCmp::Ge,
            };
            let [r, v] = exact::<2>(name, args, &span)?;
            let v = real_arg(&v)?;
            Value::Region(Region::radius(region_arg(r)?, op, v))
        }
        "complete" => {
            let [r] = exact::<1>(name, args, &span)?;
            Value::Region(Region::complete(region_arg(r)?))
        }
        "complement" => {
            let [r] = exact::<1>(name, args, &span)?;
            Value::Region(Region::complement(region_arg(r)?))
        }
        "difference" => {
            let [a, b] = exact::<2>(name, args, &span)?;
            Value::Region(Region::difference(region_arg(a)?, region_arg(b)?))
        }
        "locset-nil" => {
            exact::<0>(name, args, &span)?;
            Value::Locset(Locset::nil())
        }
        "location" => {
            let [b, p] = exact::<2>(name, args, &span)?;
            let loc = Location::new(int_arg(&b)?, real_arg(&p)?).map(Locset::Location);
            Value::Locset(with_span(loc, &span)?)
        }
        "terminal" => {
            exact::<0>(name, args, &span)?;
            Value::Locset(Locset::terminal())
        }
        "root" => {
            exact::<0>(name, args, &span)?;
            Value::Locset(Locset::root())
        }
        "segment-boundaries" => {
            exact::<0>(name, args, &span)?;
            Value::Locset(Locset::segment_boundaries())
        }
        "on-branches" => {
            let [p] = exact::<1>(name, args, &span)?;
            Value::Locset(with_span(Locset::on_branches(real_arg(&p)?), &span)?)
        }
        "locset" => {
            let [n] = exact::<1>(name, args, &span)?;
            Value::Locset(Locset::named(string_arg(n)?))
        }
        "distal" => {
            let [r] = exact::<1>(name, args, &span)?;
            Value::Locset(Locset::most_distal(region_arg(r)?))
        }
        "proximal" => {
            let [r] = exact::<1>(name, args, &span)?;
            Value::Locset(Locset::most_proximal(region_arg(r)?))
        }
        "boundary" => {
            let [r] = exact::<1>(name, args, &span)?;
            Value::Locset(Locset::boundary(region_arg(r)?))
        }
        "cboundary" => {
            let [r] = exact::<1>(name, args, &span)?;
            Value::Locset(Locset::cboundary(region_arg(r)?))
        }
        "on-components" => {
            let [p, r] = exact::<2>(name, args, &span)?;
            let p = real_arg(&p)?;
            Value::Locset(Locset::on_components(p, region_arg(r)?))
        }
        "uniform" => {
            let [r, left, right, seed] = exact::<4>(name, args, &span)?;
            Value::Locset(Locset::uniform(
                region_arg(r)?,
                int_arg(&left)?,
                int_arg(&right)?,
                int_arg(&seed)?,
            ))
        }
        "support" => {
            let [l] = exact::<1>(name, args, &span)?;
            Value::Locset(Locset::support(locset_arg(l)?))
        }
        "restrict" => {
            let [l, r] = exact::<2>(name, args, &span)?;
            Value::Locset(Locset::restrict(locset_arg(l)?, region_arg(r)?))
        }
        "sum" | "join" | "intersect" => {
            if args.len() < 2 {
                return Err(parse_error(
                    format!("'{}' takes at least 2 arguments, {} given", name, args.len()),
                    &span,
                ));
            }
            if name == "sum" {
                Value::Locset(fold_locsets(args, Locset::sum)?)
            } else if is_locset_form(&args, &span)? {
                let op = if name == "join" { Locset::join } else { Locset::intersect };
                Value::Locset(fold_locsets(args, op)?)
            } else {
                let op = if name == "join" { Region::join } else { Region::intersect };
                Value::Region(fold_regions(args, op)?)
            }
        }
        other => return Err(parse_error(format!("unknown expression '{}'", other), &span)),
    };
    Ok(value)
}

fn eval_top(input: &str) -> MorphResult<(Value, Span)> {
    let (expr, span) = read(input)?;
    let value = eval((expr, span.clone()))?;
    Ok((value, span))
}

/// Parse an expression of either algebra
pub fn parse_label_expression(input: &str) -> MorphResult<LabelExpression> {
    match eval_top(input)? {
        (Value::Region(r), _) => Ok(LabelExpression::Region(r)),
        (Value::Locset(l), _) => Ok(LabelExpression::Locset(l)),
        (Value::Str(_), span) => Err(parse_error(
            "a bare name is ambiguous, use (region \"..\") or (locset \"..\")",
            &span,
        )),
        (v, span) => Err(parse_error(
            format!("expected region or locset, found {}", v.kind()),
            &span,
        )),
    }
}

pub fn parse_region_expression(input: &str) -> MorphResult<Region> {
    eval_top(input).and_then(region_arg)
}

pub fn parse_locset_expression(input: &str) -> MorphResult<Locset> {
    eval_top(input).and_then(locset_arg)
}

impl FromStr for Region {
    type Err = MorphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_region_expression(s)
    }
}

impl FromStr for Locset {
    type Err = MorphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_locset_expression(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader() {
        let (e, _) = read(" (a 1 -2.5 \"x y\" (b)) ").unwrap();
        match e {
            SExpr::List(items) => {
                let kinds: Vec<SExpr> = items.into_iter().map(|(e, _)| e).collect();
                assert_eq!(kinds[0], SExpr::Symbol("a".into()));
                assert_eq!(kinds[1], SExpr::Int(1));
                assert_eq!(kinds[2], SExpr::Real(-2.5));
                assert_eq!(kinds[3], SExpr::Str("x y".into()));
                assert!(matches!(kinds[4], SExpr::List(_)));
            }
            other => panic!("expected list, got {:?}", other),
        }
        assert!(read("(a (b)").is_err());
        assert!(read("( )").is_ok());
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            parse_region_expression("(cable 1 0 0.5)").unwrap(),
            Region::cable(1, 0.0, 0.5).unwrap()
        );
        assert_eq!(
            parse_locset_expression("(location 0 1)").unwrap(),
            Locset::location(0, 1.0).unwrap()
        );
        assert_eq!(
            parse_region_expression("\"soma\"").unwrap(),
            Region::named("soma")
        );
        assert_eq!(
            parse_locset_expression("(terminal)").unwrap(),
            Locset::terminal()
        );
    }

    #[test]
    fn test_variadic_fold() {
        let r = parse_region_expression("(join (tag 1) (tag 2) (tag 3))").unwrap();
        assert_eq!(
            r,
            Region::join(
                Region::join(Region::tagged(1), Region::tagged(2)),
                Region::tagged(3)
            )
        );

        let l = parse_label_expression("(intersect \"a\" (root))").unwrap();
        assert_eq!(
            l,
            LabelExpression::Locset(Locset::intersect(Locset::named("a"), Locset::root()))
        );
        assert!(parse_label_expression("(join \"a\" \"b\")").is_err());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_region_expression("(cable 0 0.5)"),
            Err(MorphError::Parse { .. })
        ));
        assert!(matches!(
            parse_region_expression("(cable 0 0.7 0.5)"),
            Err(MorphError::Parse { .. })
        ));
        assert!(matches!(
            parse_locset_expression("(location -1 0.5)"),
            Err(MorphError::Parse { .. })
        ));
        assert!(parse_region_expression("(frobnicate)").is_err());
        assert!(parse_region_expression("(root)").is_err());
        assert!(parse_locset_expression("(distal 3)").is_err());
        assert!(parse_label_expression("\"x\"").is_err());
        // Names need quoting; a bare symbol is never a label reference
        assert!(matches!(
            "dend".parse::<Region>(),
            Err(MorphError::Parse { position: 0, .. })
        ));
        assert_eq!(
            "(region \"dend\")".parse::<Region>().unwrap(),
            Region::named("dend")
        );

        match parse_region_expression("(join (tag 1) (bogus))") {
            Err(MorphError::Parse { position, .. }) => assert_eq!(position, 14),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_print_round_trip() {
        let exprs = [
            "(restrict (uniform (tag 3) 0 9 42) (cable 0 0.0 0.5))",
            "(on-components 0.5 (complete (region \"dend\")))",
            "(difference (all) (radius-ge (branch 2) 1.5))",
            "(sum (location 0 0.5) (cboundary (proximal-interval (terminal) 20.0)))",
        ];
        for s in exprs {
            let parsed = parse_label_expression(s).unwrap();
            let printed = match &parsed {
                LabelExpression::Region(r) => r.to_string(),
                LabelExpression::Locset(l) => l.to_string(),
            };
            assert_eq!(printed, s);
        }
    }

    #[test]
    fn test_seed_full_range() {
        let ls = Locset::uniform(Region::all(), 0, 1, u64::MAX);
        let printed = ls.to_string();
        assert_eq!(printed, "(uniform (all) 0 1 18446744073709551615)");
        assert_eq!(printed.parse::<Locset>().unwrap(), ls);

        assert!(matches!(
            parse_locset_expression("(uniform (all) 0 1 18446744073709551616)"),
            Err(MorphError::Parse { .. })
        ));
        assert!(matches!(
            parse_locset_expression("(uniform (all) 0 1 -1)"),
            Err(MorphError::Parse { .. })
        ));
    }
}
