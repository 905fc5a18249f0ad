// Date pattern parser (dayjs-style tokens such as "YYYY-[Q]Q")

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::{anychar, char},
    combinator::{map, value},
    multi::many0,
    sequence::delimited,
    IResult,
};

/// One unit of a date pattern
#[derive(Debug, Clone, PartialEq)]
pub enum DateToken {
    Year4,
    Year2,
    Quarter,
    Month2,
    Month,
    Day2,
    Day,
    DayOrdinal,
    Week2,
    Week,
    Hour24Padded,
    Hour24,
    Hour12Padded,
    Hour12,
    Minute2,
    Minute,
    Second2,
    Second,
    MeridiemUpper,
    MeridiemLower,
    Literal(String),
}

/// Text wrapped in brackets is emitted verbatim: `[W]` -> "W"
fn escaped_literal(input: &str) -> IResult<&str, DateToken> {
    map(delimited(char('['), take_until("]"), char(']')), |s: &str| {
        DateToken::Literal(s.to_string())
    })(input)
}

fn date_part(input: &str) -> IResult<&str, DateToken> {
    // Longer tokens first so "YYYY" never parses as two "YY"
    alt((
        value(DateToken::Year4, tag("YYYY")),
        value(DateToken::Year2, tag("YY")),
        value(DateToken::Quarter, tag("Q")),
        value(DateToken::Month2, tag("MM")),
        value(DateToken::Month, tag("M")),
        value(DateToken::DayOrdinal, tag("Do")),
        value(DateToken::Day2, tag("DD")),
        value(DateToken::Day, tag("D")),
        value(DateToken::Week2, tag("ww")),
        value(DateToken::Week, tag("w")),
    ))(input)
}

fn time_part(input: &str) -> IResult<&str, DateToken> {
    alt((
        value(DateToken::Hour24Padded, tag("HH")),
        value(DateToken::Hour24, tag("H")),
        value(DateToken::Hour12Padded, tag("hh")),
        value(DateToken::Hour12, tag("h")),
        value(DateToken::Minute2, tag("mm")),
        value(DateToken::Minute, tag("m")),
        value(DateToken::Second2, tag("ss")),
        value(DateToken::Second, tag("s")),
        value(DateToken::MeridiemUpper, tag("A")),
        value(DateToken::MeridiemLower, tag("a")),
    ))(input)
}

fn token(input: &str) -> IResult<&str, DateToken> {
    alt((
        escaped_literal,
        date_part,
        time_part,
        map(anychar, |c| DateToken::Literal(c.to_string())),
    ))(input)
}

/// Parse a complete pattern into tokens
pub fn parse_date_pattern(input: &str) -> IResult<&str, Vec<DateToken>> {
    many0(token)(input)
}

/// Tokenize a pattern, merging adjacent literal runs.
/// Every input is accepted: unknown characters become literals.
pub fn tokenize(pattern: &str) -> Vec<DateToken> {
    let tokens = match parse_date_pattern(pattern) {
        Ok((_, tokens)) => tokens,
        Err(_) => vec![DateToken::Literal(pattern.to_string())],
    };

    let mut merged: Vec<DateToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match (merged.last_mut(), token) {
            (Some(DateToken::Literal(prev)), DateToken::Literal(next)) => prev.push_str(&next),
            (_, token) => merged.push(token),
        }
    }
    merged
}
