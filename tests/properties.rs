use markdown_splice::{
    codec, AmbiguityPolicy, CodecFormat, DeleteFrontmatterOperation, DeleteOperation, Document,
    FrontmatterFormat, InsertOperation, InsertPosition, MarkdownDocument, Operation,
    ReplaceFrontmatterOperation, ReplaceOperation, Selector, SelectorBuilder,
    SetFrontmatterOperation, SpliceError,
};
use proptest::prelude::*;
use serde_yaml::{Mapping, Value};

fn paragraphs() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,4}", 1..8)
}

fn document_text(paragraphs: &[String]) -> String {
    format!("# Title\n\n{}\n", paragraphs.join("\n\n"))
}

fn nth_paragraph(ordinal: usize) -> Selector {
    Selector::builder()
        .select_type("p")
        .ordinal(ordinal)
        .build()
        .unwrap()
}

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn comment() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]{1,8}( [a-z]{1,8}){0,3}")
}

/// Flags in the order they are displayed, so a decoded selector compares equal.
fn regex_flags() -> impl Strategy<Value = String> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(i, m, s)| {
        [(i, 'i'), (m, 'm'), (s, 's')]
            .into_iter()
            .filter_map(|(on, flag)| on.then_some(flag))
            .collect()
    })
}

fn unscoped_selector() -> impl Strategy<Value = SelectorBuilder> {
    (
        prop::sample::select(vec!["p", "h1", "h2", "li", "list", "blockquote"]),
        prop::option::of(word()),
        prop::option::of((word(), regex_flags())),
        prop::option::of(word()),
        1usize..4,
    )
        .prop_map(|(select_type, contains, regex, alias, ordinal)| {
            let mut builder = Selector::builder()
                .select_type(select_type)
                .ordinal(ordinal);
            if let Some(contains) = contains {
                builder = builder.contains(contains);
            }
            if let Some((pattern, flags)) = regex {
                builder = builder.regex_with_flags(pattern, flags);
            }
            if let Some(alias) = alias {
                builder = builder.alias(alias);
            }
            builder
        })
}

fn selector() -> impl Strategy<Value = Selector> {
    (unscoped_selector(), 0usize..5, unscoped_selector(), word()).prop_map(
        |(builder, scope, anchor, name)| {
            let builder = match scope {
                1 => builder.after(anchor.build().unwrap()),
                2 => builder.after_ref(name),
                3 => builder.within(anchor.build().unwrap()),
                4 => builder.within_ref(name),
                _ => builder,
            };
            builder.build().unwrap()
        },
    )
}

/// Frontmatter payloads that read back identically from both YAML and JSON.
fn frontmatter_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        prop::sample::select(vec![0.5, 1.25, -3.75]).prop_map(Value::from),
        "[A-Z][a-z]{2,8} [a-z]{1,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
            prop::collection::vec((word(), inner), 0..4).prop_map(|entries| {
                Value::Mapping(
                    entries
                        .into_iter()
                        .map(|(key, value)| (Value::String(key), value))
                        .collect(),
                )
            }),
        ]
    })
}

fn key_path() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(\\.[a-z]{1,6})?(\\[[0-9]\\])?"
}

fn frontmatter_format() -> impl Strategy<Value = Option<FrontmatterFormat>> {
    prop::option::of(prop::sample::select(vec![
        FrontmatterFormat::Yaml,
        FrontmatterFormat::Toml,
    ]))
}

fn frontmatter_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (key_path(), frontmatter_value(), frontmatter_format(), comment()).prop_map(
            |(key, value, format, comment)| {
                let mut operation = SetFrontmatterOperation::new(&key, value).unwrap();
                if let Some(format) = format {
                    operation = operation.with_format(format);
                }
                if let Some(comment) = comment {
                    operation = operation.with_comment(comment);
                }
                operation.into()
            }
        ),
        (key_path(), comment()).prop_map(|(key, comment)| {
            let mut operation = DeleteFrontmatterOperation::new(&key).unwrap();
            if let Some(comment) = comment {
                operation = operation.with_comment(comment);
            }
            operation.into()
        }),
        (frontmatter_value(), frontmatter_format(), comment()).prop_map(
            |(content, format, comment)| {
                let mut operation = ReplaceFrontmatterOperation::new(content);
                if let Some(format) = format {
                    operation = operation.with_format(format);
                }
                if let Some(comment) = comment {
                    operation = operation.with_comment(comment);
                }
                operation.into()
            }
        ),
    ]
}

/// Either an inline selector or a reference to an alias.
fn target() -> impl Strategy<Value = Result<Selector, String>> {
    prop_oneof![selector().prop_map(Ok), word().prop_map(Err)]
}

fn block_operation() -> impl Strategy<Value = Operation> {
    let content = "[a-zA-Z0-9 .,]{0,20}";
    prop_oneof![
        (target(), content, 0usize..4, comment()).prop_map(
            |(target, content, position, comment)| {
                let position = [
                    InsertPosition::Before,
                    InsertPosition::After,
                    InsertPosition::PrependChild,
                    InsertPosition::AppendChild,
                ][position];
                let mut builder = InsertOperation::builder().content(content).position(position);
                builder = match target {
                    Ok(selector) => builder.selector(selector),
                    Err(alias) => builder.selector_ref(alias),
                };
                if let Some(comment) = comment {
                    builder = builder.comment(comment);
                }
                builder.build().unwrap().into()
            }
        ),
        (target(), content, prop::option::of(target()), comment()).prop_map(
            |(target, content, until, comment)| {
                let mut builder = ReplaceOperation::builder().content(content);
                builder = match target {
                    Ok(selector) => builder.selector(selector),
                    Err(alias) => builder.selector_ref(alias),
                };
                builder = match until {
                    Some(Ok(until)) => builder.until(until),
                    Some(Err(alias)) => builder.until_ref(alias),
                    None => builder,
                };
                if let Some(comment) = comment {
                    builder = builder.comment(comment);
                }
                builder.build().unwrap().into()
            }
        ),
        (target(), any::<bool>(), prop::option::of(target()), comment()).prop_map(
            |(target, section, until, comment)| {
                let mut builder = DeleteOperation::builder().section(section);
                builder = match target {
                    Ok(selector) => builder.selector(selector),
                    Err(alias) => builder.selector_ref(alias),
                };
                builder = match until {
                    Some(Ok(until)) => builder.until(until),
                    Some(Err(alias)) => builder.until_ref(alias),
                    None => builder,
                };
                if let Some(comment) = comment {
                    builder = builder.comment(comment);
                }
                builder.build().unwrap().into()
            }
        ),
    ]
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![3 => block_operation(), 1 => frontmatter_operation()]
}

proptest! {
    #[test]
    fn failed_transactions_change_nothing(paragraphs in paragraphs()) {
        let text = document_text(&paragraphs);
        let mut document: MarkdownDocument = text.parse().unwrap();

        let operations: Vec<Operation> = vec![
            DeleteOperation::builder().selector(nth_paragraph(1)).build().unwrap().into(),
            DeleteOperation::builder()
                .selector(Selector::builder().contains("NOT PRESENT").build().unwrap())
                .build()
                .unwrap()
                .into(),
        ];

        let error = document.apply(&operations, AmbiguityPolicy::Ignore).unwrap_err();
        let failed_at_second = matches!(error, SpliceError::OperationFailed { index: 1, .. });
        prop_assert!(failed_at_second);
        prop_assert_eq!(document.render(), text);
    }

    #[test]
    fn preview_matches_apply_and_is_repeatable(
        paragraphs in paragraphs(),
        pick in any::<prop::sample::Index>(),
    ) {
        let text = document_text(&paragraphs);
        let document: MarkdownDocument = text.parse().unwrap();
        let removed = pick.index(paragraphs.len());

        let operations: Vec<Operation> = vec![DeleteOperation::builder()
            .selector(nth_paragraph(removed + 1))
            .build()
            .unwrap()
            .into()];

        let first = document.preview(&operations, AmbiguityPolicy::Ignore).unwrap();
        let second = document.preview(&operations, AmbiguityPolicy::Ignore).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(document.render(), text);

        let mut expected = paragraphs.clone();
        expected.remove(removed);
        let expected = if expected.is_empty() {
            "# Title\n".to_string()
        } else {
            document_text(&expected)
        };
        prop_assert_eq!(&first, &expected);

        let mut applied = document.clone();
        applied.apply(&operations, AmbiguityPolicy::Ignore).unwrap();
        prop_assert_eq!(applied.render(), first);
    }

    #[test]
    fn codec_round_trips(operations in prop::collection::vec(operation(), 0..6)) {
        for format in [CodecFormat::Yaml, CodecFormat::Json] {
            let encoded = codec::dumps(&operations, format).unwrap();
            let decoded = codec::loads(&encoded, format).unwrap();
            prop_assert_eq!(&decoded, &operations);
        }
    }
}

#[test]
fn yaml_round_trip_keeps_integer_keys_and_infinity() {
    let mut content = Mapping::new();
    content.insert(Value::from(1), Value::from("one"));
    content.insert(Value::from("ratio"), Value::from(f64::INFINITY));
    content.insert(Value::from("floor"), Value::from(f64::NEG_INFINITY));
    let operations: Vec<Operation> = vec![
        ReplaceFrontmatterOperation::new(Value::Mapping(content))
            .with_comment("typed keys")
            .into(),
    ];

    let encoded = codec::dumps(&operations, CodecFormat::Yaml).unwrap();
    assert_eq!(codec::loads(&encoded, CodecFormat::Yaml).unwrap(), operations);
}
