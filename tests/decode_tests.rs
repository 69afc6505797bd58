//! Integration tests for decoding through the facade.
//!
//! Covers:
//! - The db.port / db.name example end to end
//! - Decoder priority and registration-order tie-break
//! - Path mapping, array access and overlay-aware lookups

use overlay_config::decoder::{DecodedValue, DecoderContext, DecoderRegistry, Priority, TypeCapture};
use overlay_config::node::ConfigNode;
use overlay_config::{
    ConfigError, ConfigNodeContainer, Decoder, EngineSettings, OverlayConfig, Tags, Validated, ValidationLevel,
};

fn engine_with(sources: Vec<(ConfigNode, Tags)>) -> OverlayConfig {
    let engine = OverlayConfig::new(EngineSettings::default()).expect("default settings are valid");
    for (index, (node, tags)) in sources.into_iter().enumerate() {
        engine
            .add_container(ConfigNodeContainer::new(format!("source-{}", index), node, tags))
            .expect("fresh container");
    }
    engine
}

#[test]
fn test_db_port_example() {
    let engine = engine_with(vec![
        (
            ConfigNode::map([("db", ConfigNode::map([("port", ConfigNode::leaf("100"))]))]),
            Tags::none(),
        ),
        (
            ConfigNode::map([("db", ConfigNode::map([("name", ConfigNode::leaf("test"))]))]),
            Tags::none(),
        ),
    ]);

    let port = engine.get_validated::<i32>("db.port", &Tags::none());
    assert_eq!(port.value(), Some(&100));
    assert!(!port.has_errors());
    assert_eq!(engine.get::<String>("db.name", &Tags::none()).unwrap(), "test");
}

#[test]
fn test_overlay_value_wins_for_matching_tags() {
    let engine = engine_with(vec![
        (
            ConfigNode::map([("db", ConfigNode::map([("port", ConfigNode::leaf("100"))]))]),
            Tags::none(),
        ),
        (
            ConfigNode::map([("db", ConfigNode::map([("port", ConfigNode::leaf("200"))]))]),
            Tags::environment("dev"),
        ),
    ]);
    assert_eq!(engine.get::<i32>("db.port", &Tags::none()).unwrap(), 100);
    assert_eq!(engine.get::<i32>("db.port", &Tags::environment("dev")).unwrap(), 200);
    assert_eq!(engine.get::<i32>("db.port", &Tags::environment("prod")).unwrap(), 100);
}

#[test]
fn test_paths_with_indices_and_mapped_names() {
    let engine = engine_with(vec![(
        ConfigNode::map([
            (
                "servers",
                ConfigNode::array([
                    ConfigNode::map([("host", ConfigNode::leaf("a")), ("max_conn", ConfigNode::leaf("5"))]),
                    ConfigNode::map([("host", ConfigNode::leaf("b")), ("max-idle", ConfigNode::leaf("2"))]),
                ]),
            ),
            ("retries", ConfigNode::array([ConfigNode::leaf("1"), ConfigNode::leaf("2")])),
        ]),
        Tags::none(),
    )]);

    assert_eq!(engine.get::<String>("servers[1].host", &Tags::none()).unwrap(), "b");
    assert_eq!(engine.get::<u32>("servers[0].maxConn", &Tags::none()).unwrap(), 5);
    assert_eq!(engine.get::<u32>("servers[1].maxIdle", &Tags::none()).unwrap(), 2);
    assert_eq!(engine.get_list::<u8>("retries", &Tags::none()).unwrap(), vec![1, 2]);
}

#[test]
fn test_mismatch_and_missing_messages() {
    let engine = engine_with(vec![(
        ConfigNode::map([("db", ConfigNode::leaf("sqlite"))]),
        Tags::none(),
    )]);

    let result = engine.get_validated::<String>("db.port", &Tags::none());
    assert!(!result.has_results());
    assert_eq!(result.errors()[0].level, ValidationLevel::Error);
    assert_eq!(
        result.errors()[0].description,
        "Mismatched node type for path: db.port, expected: map, received: leaf"
    );

    let err = engine.get::<i32>("missing", &Tags::none()).unwrap_err();
    match err {
        ConfigError::Validation { path, type_name, errors } => {
            assert_eq!(path, "missing");
            assert_eq!(type_name, "i32");
            assert_eq!(
                errors[0].description,
                "Unable to find node matching path: missing, for token: missing"
            );
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[derive(Debug, PartialEq)]
struct Port(u16);

struct PortDecoder {
    name: &'static str,
    priority: Priority,
    offset: u16,
}

impl Decoder for PortDecoder {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn matches(&self, target: &TypeCapture) -> bool {
        target.is::<Port>()
    }

    fn decode(
        &self,
        path: &str,
        tags: &Tags,
        node: Option<&ConfigNode>,
        _target: &TypeCapture,
        ctx: &DecoderContext<'_>,
    ) -> Validated<DecodedValue> {
        let offset = self.offset;
        ctx.registry
            .decode_node_in::<u16>(path, tags, node, ctx)
            .map(|p| Box::new(Port(p + offset)) as DecodedValue)
    }
}

fn port_engine(decoders: Vec<PortDecoder>) -> OverlayConfig {
    let mut registry = DecoderRegistry::with_defaults(EngineSettings::default());
    for decoder in decoders {
        registry.register(decoder);
    }
    engine_with(vec![(
        ConfigNode::map([("port", ConfigNode::leaf("8000"))]),
        Tags::none(),
    )])
    .with_registry(registry)
}

#[test]
fn test_decoder_priority_tie_break() {
    let engine = port_engine(vec![
        PortDecoder {
            name: "first",
            priority: Priority::Medium,
            offset: 1,
        },
        PortDecoder {
            name: "second",
            priority: Priority::Medium,
            offset: 2,
        },
    ]);
    assert_eq!(engine.get::<Port>("port", &Tags::none()).unwrap(), Port(8001));

    let engine = port_engine(vec![
        PortDecoder {
            name: "low",
            priority: Priority::Low,
            offset: 1,
        },
        PortDecoder {
            name: "very-high",
            priority: Priority::VeryHigh,
            offset: 2,
        },
    ]);
    assert_eq!(engine.get::<Port>("port", &Tags::none()).unwrap(), Port(8002));

    let engine = port_engine(vec![
        PortDecoder {
            name: "very-high",
            priority: Priority::VeryHigh,
            offset: 2,
        },
        PortDecoder {
            name: "high",
            priority: Priority::High,
            offset: 1,
        },
    ]);
    assert_eq!(engine.get::<Port>("port", &Tags::none()).unwrap(), Port(8002));
}

#[test]
fn test_no_decoder_is_terminal() {
    let engine = port_engine(Vec::new());
    let err = engine.get::<Port>("port", &Tags::none()).unwrap_err();
    assert!(err.to_string().contains("No decoders found for class:"));
}
