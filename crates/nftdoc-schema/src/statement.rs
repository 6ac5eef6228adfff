//! Rule statements.
//!
//! nftables encodes a statement as an object with a single distinguishing
//! key (`{"match":{..}}`, `{"drop":null}`, `{"jump":{"target":"c"}}`)
//! rather than with a type tag, so `Statement` carries hand-written serde
//! impls. Encoding is deterministic: struct fields are written in
//! declaration order and every typed variant produces exactly one key.
//! Rule lookup depends on this, it compares statements by their encoding.
//!
//! A known key is only decoded into a typed variant when that variant
//! encodes back to the same JSON; anything it would drop or reshape
//! (extra fields, an unknown operator, a verdict with a value) is kept
//! as `Statement::Raw` instead.

use crate::expression::{Expression, RawJson, UNSUPPORTED_EXPRESSION};
use crate::object::Family;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use std::collections::BTreeMap;

const KEY_MATCH: &str = "match";
const KEY_COUNTER: &str = "counter";
const KEY_ACCEPT: &str = "accept";
const KEY_CONTINUE: &str = "continue";
const KEY_DROP: &str = "drop";
const KEY_RETURN: &str = "return";
const KEY_JUMP: &str = "jump";
const KEY_GOTO: &str = "goto";
const KEY_DNAT: &str = "dnat";
const KEY_SNAT: &str = "snat";
const KEY_MASQUERADE: &str = "masquerade";
const KEY_REDIRECT: &str = "redirect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "&")]
    And,
    #[serde(rename = "|")]
    Or,
    #[serde(rename = "^")]
    Xor,
    #[serde(rename = "<<")]
    Lshift,
    #[serde(rename = ">>")]
    Rshift,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "in")]
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub op: Operator,
    pub left: Expression,
    pub right: Expression,
}

/// Inline anonymous counter or a reference to a named counter object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Counter {
    Named(String),
    Anonymous { packets: u64, bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpTarget {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Continue,
    Drop,
    Return,
    Jump(JumpTarget),
    Goto(JumpTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NatFlag {
    Random,
    FullyRandom,
    Persistent,
}

/// NAT flags. A single flag is written as a bare string, several as an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatFlags(pub Vec<NatFlag>);

impl Serialize for NatFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => single.serialize(serializer),
            flags => flags.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for NatFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(NatFlag),
            Many(Vec<NatFlag>),
        }

        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(flag) => Self(vec![flag]),
            OneOrMany::Many(flags) => Self(flags),
        })
    }
}

impl From<NatFlag> for NatFlags {
    fn from(flag: NatFlag) -> Self {
        Self(vec![flag])
    }
}

/// Source or destination NAT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<Family>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<NatFlags>,
}

/// Masquerade or redirect. Written as `null` when neither field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<NatFlags>,
}

impl PortMapping {
    pub fn is_empty(&self) -> bool {
        self.port.is_none() && self.flags.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Match(Match),
    Counter(Counter),
    Verdict(Verdict),
    Dnat(Nat),
    Snat(Nat),
    Masquerade(PortMapping),
    Redirect(PortMapping),
    /// Anything not recognized above, kept verbatim.
    Raw(RawJson),
}

impl Statement {
    pub fn matching(
        op: Operator,
        left: impl Into<Expression>,
        right: impl Into<Expression>,
    ) -> Self {
        Self::Match(Match {
            op,
            left: left.into(),
            right: right.into(),
        })
    }

    pub fn accept() -> Self {
        Self::Verdict(Verdict::Accept)
    }

    pub fn drop() -> Self {
        Self::Verdict(Verdict::Drop)
    }

    pub fn continue_() -> Self {
        Self::Verdict(Verdict::Continue)
    }

    pub fn return_() -> Self {
        Self::Verdict(Verdict::Return)
    }

    pub fn jump(target: impl Into<String>) -> Self {
        Self::Verdict(Verdict::Jump(JumpTarget {
            target: target.into(),
        }))
    }

    pub fn goto(target: impl Into<String>) -> Self {
        Self::Verdict(Verdict::Goto(JumpTarget {
            target: target.into(),
        }))
    }

    pub fn counter() -> Self {
        Self::Counter(Counter::Anonymous {
            packets: 0,
            bytes: 0,
        })
    }

    pub fn named_counter(name: impl Into<String>) -> Self {
        Self::Counter(Counter::Named(name.into()))
    }

    pub fn masquerade() -> Self {
        Self::Masquerade(PortMapping::default())
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Verdict(verdict) => Some(verdict),
            _ => None,
        }
    }
}

impl Serialize for Statement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Raw(raw) => raw.serialize(serializer),
            Self::Match(m) => single_key(serializer, KEY_MATCH, m),
            Self::Counter(c) => single_key(serializer, KEY_COUNTER, c),
            Self::Verdict(Verdict::Accept) => single_key(serializer, KEY_ACCEPT, &()),
            Self::Verdict(Verdict::Continue) => single_key(serializer, KEY_CONTINUE, &()),
            Self::Verdict(Verdict::Drop) => single_key(serializer, KEY_DROP, &()),
            Self::Verdict(Verdict::Return) => single_key(serializer, KEY_RETURN, &()),
            Self::Verdict(Verdict::Jump(t)) => single_key(serializer, KEY_JUMP, t),
            Self::Verdict(Verdict::Goto(t)) => single_key(serializer, KEY_GOTO, t),
            Self::Dnat(nat) => single_key(serializer, KEY_DNAT, nat),
            Self::Snat(nat) => single_key(serializer, KEY_SNAT, nat),
            Self::Masquerade(m) if m.is_empty() => single_key(serializer, KEY_MASQUERADE, &()),
            Self::Masquerade(m) => single_key(serializer, KEY_MASQUERADE, m),
            Self::Redirect(m) if m.is_empty() => single_key(serializer, KEY_REDIRECT, &()),
            Self::Redirect(m) => single_key(serializer, KEY_REDIRECT, m),
        }
    }
}

fn single_key<S, T>(serializer: S, key: &str, value: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

impl<'de> Deserialize<'de> for Statement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let verbatim = || Self::Raw(RawJson::from(raw.clone()));

        let keys: BTreeMap<String, &RawValue> = match serde_json::from_str(raw.get()) {
            Ok(keys) => keys,
            Err(_) => return Ok(verbatim()),
        };
        let mut entries = keys.iter();
        let (Some((key, value)), None) = (entries.next(), entries.next()) else {
            return Ok(verbatim());
        };

        match decode_keyed(key, value) {
            Ok(Some(statement)) if encodes_back(&statement, &raw) => Ok(statement),
            Err(err) if err.to_string().contains(UNSUPPORTED_EXPRESSION) => {
                Err(de::Error::custom(err))
            }
            _ => Ok(verbatim()),
        }
    }
}

/// Whether the typed decode kept every field of `raw`.
fn encodes_back(statement: &Statement, raw: &RawValue) -> bool {
    match (
        serde_json::to_value(statement),
        serde_json::from_str::<Value>(raw.get()),
    ) {
        (Ok(encoded), Ok(original)) => encoded == original,
        _ => false,
    }
}

/// Decodes the value of a single-key statement. `Ok(None)` for unknown keys.
fn decode_keyed(key: &str, value: &RawValue) -> serde_json::Result<Option<Statement>> {
    let json = value.get();
    let statement = match key {
        KEY_MATCH => Statement::Match(serde_json::from_str(json)?),
        KEY_COUNTER => Statement::Counter(serde_json::from_str(json)?),
        KEY_ACCEPT => Statement::Verdict(Verdict::Accept),
        KEY_CONTINUE => Statement::Verdict(Verdict::Continue),
        KEY_DROP => Statement::Verdict(Verdict::Drop),
        KEY_RETURN => Statement::Verdict(Verdict::Return),
        KEY_JUMP => Statement::Verdict(Verdict::Jump(serde_json::from_str(json)?)),
        KEY_GOTO => Statement::Verdict(Verdict::Goto(serde_json::from_str(json)?)),
        KEY_DNAT => Statement::Dnat(serde_json::from_str(json)?),
        KEY_SNAT => Statement::Snat(serde_json::from_str(json)?),
        KEY_MASQUERADE => Statement::Masquerade(decode_port_mapping(json)?),
        KEY_REDIRECT => Statement::Redirect(decode_port_mapping(json)?),
        _ => return Ok(None),
    };
    Ok(Some(statement))
}

fn decode_port_mapping(json: &str) -> serde_json::Result<PortMapping> {
    serde_json::from_str::<Option<PortMapping>>(json).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(statement: &Statement) -> String {
        serde_json::to_string(statement).unwrap()
    }

    fn decode(json: &str) -> Statement {
        serde_json::from_str(json).unwrap()
    }

    fn assert_round_trip(statement: Statement, expected: &str) {
        assert_eq!(encode(&statement), expected);
        assert_eq!(decode(expected), statement);
    }

    #[test]
    fn match_keeps_op_left_right_order() {
        let statement = Statement::matching(
            Operator::Eq,
            Expression::payload("ip", "saddr"),
            "10.10.10.10",
        );
        assert_round_trip(
            statement,
            r#"{"match":{"op":"==","left":{"payload":{"protocol":"ip","field":"saddr"}},"right":"10.10.10.10"}}"#,
        );
    }

    #[test]
    fn simple_verdicts_are_null_keys() {
        assert_round_trip(Statement::accept(), r#"{"accept":null}"#);
        assert_round_trip(Statement::continue_(), r#"{"continue":null}"#);
        assert_round_trip(Statement::drop(), r#"{"drop":null}"#);
        assert_round_trip(Statement::return_(), r#"{"return":null}"#);
    }

    #[test]
    fn verdict_with_value_stays_raw() {
        let input = r#"{"drop":{"reason":1}}"#;
        let statement = decode(input);
        assert!(matches!(statement, Statement::Raw(_)));
        assert_eq!(encode(&statement), input);
    }

    #[test]
    fn known_keys_with_extra_fields_stay_raw() {
        let inputs = [
            r#"{"dnat":{"addr":"10.0.0.0","type_flags":"prefix"}}"#,
            r#"{"snat":{"addr":"10.0.0.1","port":80,"extra":true}}"#,
            r#"{"masquerade":{"port":1024,"extra":"x"}}"#,
            r#"{"redirect":{"flags":"random","extra":1}}"#,
            r#"{"counter":{"packets":1,"bytes":2,"extra":3}}"#,
            r#"{"match":{"op":"==","left":"a","right":"b","x":1}}"#,
            r#"{"jump":{"target":"c","extra":1}}"#,
        ];

        for input in inputs {
            let statement = decode(input);
            assert!(matches!(statement, Statement::Raw(_)), "{input}");
            assert_eq!(encode(&statement), input);
        }
    }

    #[test]
    fn unknown_operator_stays_raw() {
        let input = r#"{"match":{"op":"implicit","left":"a","right":"b"}}"#;
        let statement = decode(input);
        assert!(matches!(statement, Statement::Raw(_)));
        assert_eq!(encode(&statement), input);
    }

    #[test]
    fn shapes_the_encoder_writes_differently_stay_raw() {
        for input in [
            r#"{"masquerade":{}}"#,
            r#"{"dnat":{"addr":"1.2.3.4","flags":["random"]}}"#,
            r#"{"redirect":{"port":8080.0}}"#,
        ] {
            let statement = decode(input);
            assert!(matches!(statement, Statement::Raw(_)), "{input}");
            assert_eq!(encode(&statement), input);
        }
    }

    #[test]
    fn jump_and_goto_carry_target() {
        assert_round_trip(Statement::jump("iface"), r#"{"jump":{"target":"iface"}}"#);
        assert_round_trip(Statement::goto("mac"), r#"{"goto":{"target":"mac"}}"#);
    }

    #[test]
    fn counters_inline_and_named() {
        assert_round_trip(Statement::counter(), r#"{"counter":{"packets":0,"bytes":0}}"#);
        assert_round_trip(
            Statement::named_counter("mycounter"),
            r#"{"counter":"mycounter"}"#,
        );
    }

    #[test]
    fn dnat_variants() {
        assert_round_trip(
            Statement::Dnat(Nat {
                addr: Some("1.2.3.4".into()),
                family: Some(Family::Ip),
                ..Nat::default()
            }),
            r#"{"dnat":{"addr":"1.2.3.4","family":"ip"}}"#,
        );
        assert_round_trip(
            Statement::Dnat(Nat {
                addr: Some("feed::c0fe".into()),
                family: Some(Family::Ip6),
                port: Some(Expression::Float(12345.0)),
                flags: Some(NatFlags(vec![NatFlag::Random, NatFlag::Persistent])),
            }),
            r#"{"dnat":{"addr":"feed::c0fe","family":"ip6","port":12345,"flags":["random","persistent"]}}"#,
        );
    }

    #[test]
    fn snat_with_single_flag_is_a_string() {
        assert_round_trip(
            Statement::Snat(Nat {
                addr: Some("feed::c0fe".into()),
                family: Some(Family::Ip6),
                port: Some(Expression::Float(12345.0)),
                flags: Some(NatFlag::FullyRandom.into()),
            }),
            r#"{"snat":{"addr":"feed::c0fe","family":"ip6","port":12345,"flags":"fully-random"}}"#,
        );
    }

    #[test]
    fn masquerade_and_redirect() {
        assert_round_trip(Statement::masquerade(), r#"{"masquerade":null}"#);
        assert_round_trip(
            Statement::Masquerade(PortMapping {
                port: Some(Expression::Float(12345.0)),
                flags: Some(NatFlag::FullyRandom.into()),
            }),
            r#"{"masquerade":{"port":12345,"flags":"fully-random"}}"#,
        );
        assert_round_trip(Statement::Redirect(PortMapping::default()), r#"{"redirect":null}"#);
        assert_round_trip(
            Statement::Redirect(PortMapping {
                port: Some(Expression::Float(8080.0)),
                flags: None,
            }),
            r#"{"redirect":{"port":8080}}"#,
        );
    }

    #[test]
    fn unknown_statement_round_trips_verbatim() {
        let input = r#"{"log":{"prefix":"dropped: ","level":"warn"}}"#;
        let statement = decode(input);
        assert!(matches!(statement, Statement::Raw(_)));
        assert_eq!(encode(&statement), input);
    }

    #[test]
    fn several_keys_fall_back_to_raw() {
        let input = r#"{"drop":null,"accept":null}"#;
        let statement = decode(input);
        assert!(matches!(statement, Statement::Raw(_)));
        assert_eq!(encode(&statement), input);
    }

    #[test]
    fn empty_object_is_raw() {
        let statement = decode("{}");
        assert_eq!(statement, Statement::Raw(RawJson::parse("{}").unwrap()));
        assert_eq!(encode(&statement), "{}");
    }

    #[test]
    fn raw_match_operand_survives() {
        let input = r#"{"match":{"op":"==","left":{"foo":"boo"},"right":"string-expression"}}"#;
        let statement = decode(input);
        match &statement {
            Statement::Match(m) => assert!(matches!(m.left, Expression::Raw(_))),
            other => panic!("unexpected statement: {:?}", other),
        }
        assert_eq!(encode(&statement), input);
    }

    #[test]
    fn array_operand_is_an_error() {
        let result: Result<Statement, _> =
            serde_json::from_str(r#"{"match":{"op":"in","left":"x","right":[1,2]}}"#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains(crate::UNSUPPORTED_EXPRESSION));
    }

    #[test]
    fn numeric_match_operand_reads_as_float() {
        let statement = decode(r#"{"match":{"op":"==","left":"foo","right":12345}}"#);
        assert_eq!(
            statement,
            Statement::matching(Operator::Eq, "foo", Expression::Float(12345.0))
        );
    }
}
