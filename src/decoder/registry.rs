//! Decoder dispatch, path walking and composite decoding.

use super::leaf::register_defaults;
use super::{DecodedValue, Decoder, DecoderContext, TypeCapture};
use crate::config::EngineSettings;
use crate::error::{ValidationError, ValidationLevel};
use crate::node::ConfigNode;
use crate::path::{
    KebabCasePathMapper, Lexer, PathLexer, PathMapper, SnakeCasePathMapper, StandardPathMapper, join_index,
    navigate,
};
use crate::tags::Tags;
use crate::validated::Validated;
use std::sync::Arc;
use tracing::trace;

/// Registered decoders plus the lexer and mappers used to walk paths.
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn Decoder>>,
    lexer: Arc<dyn Lexer>,
    mappers: Vec<Arc<dyn PathMapper>>,
    settings: EngineSettings,
}

impl DecoderRegistry {
    /// An empty registry with the default lexer and mappers.
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            decoders: Vec::new(),
            lexer: Arc::new(PathLexer::new(settings.path_delimiter)),
            mappers: vec![
                Arc::new(StandardPathMapper),
                Arc::new(SnakeCasePathMapper),
                Arc::new(KebabCasePathMapper),
            ],
            settings,
        }
    }

    /// A registry with the built-in leaf decoders.
    pub fn with_defaults(settings: EngineSettings) -> Self {
        let mut registry = Self::new(settings);
        register_defaults(&mut registry);
        registry
    }

    pub fn register(&mut self, decoder: impl Decoder + 'static) -> &mut Self {
        self.decoders.push(Arc::new(decoder));
        self
    }

    pub fn register_arc(&mut self, decoder: Arc<dyn Decoder>) -> &mut Self {
        self.decoders.push(decoder);
        self
    }

    pub fn with_lexer(mut self, lexer: Arc<dyn Lexer>) -> Self {
        self.lexer = lexer;
        self
    }

    /// Replace the mapper list. Mappers are tried in order.
    pub fn with_mappers(mut self, mappers: Vec<Arc<dyn PathMapper>>) -> Self {
        self.mappers = mappers;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn lexer(&self) -> &dyn Lexer {
        self.lexer.as_ref()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// A context without a facade, backed by this registry's settings.
    pub fn context(&self) -> DecoderContext<'_> {
        DecoderContext {
            registry: self,
            facade: None,
            settings: &self.settings,
        }
    }

    /// Every decoder that accepts `target`, in registration order.
    pub fn decoders_for(&self, target: &TypeCapture) -> Vec<Arc<dyn Decoder>> {
        self.decoders
            .iter()
            .filter(|d| d.matches(target))
            .cloned()
            .collect()
    }

    /// Highest priority wins; on a tie the earliest registration wins.
    fn select(
        &self,
        path: &str,
        tags: &Tags,
        node: Option<&ConfigNode>,
        target: &TypeCapture,
    ) -> Option<&Arc<dyn Decoder>> {
        let mut best: Option<&Arc<dyn Decoder>> = None;
        for decoder in &self.decoders {
            if !decoder.can_decode(path, tags, node, target) {
                continue;
            }
            if best.is_none_or(|b| decoder.priority() > b.priority()) {
                best = Some(decoder);
            }
        }
        best
    }

    /// Decode without downcasting.
    pub fn decode_dyn(
        &self,
        path: &str,
        tags: &Tags,
        node: Option<&ConfigNode>,
        target: &TypeCapture,
        ctx: &DecoderContext<'_>,
    ) -> Validated<DecodedValue> {
        match self.select(path, tags, node, target) {
            Some(decoder) => {
                trace!(path, decoder = decoder.name(), target = target.name(), "Decoding");
                decoder.decode(path, tags, node, target, ctx)
            }
            None => Validated::from_error(ValidationError::no_decoders_found(target.name())),
        }
    }

    pub fn decode_node<T: 'static>(&self, path: &str, tags: &Tags, node: Option<&ConfigNode>) -> Validated<T> {
        self.decode_node_in(path, tags, node, &self.context())
    }

    /// Decode `node` into `T` using the decoder selected for `T`.
    pub fn decode_node_in<T: 'static>(
        &self,
        path: &str,
        tags: &Tags,
        node: Option<&ConfigNode>,
        ctx: &DecoderContext<'_>,
    ) -> Validated<T> {
        let target = TypeCapture::of::<T>();
        let Some(decoder) = self.select(path, tags, node, &target) else {
            return Validated::from_error(ValidationError::no_decoders_found(target.name()));
        };
        trace!(path, decoder = decoder.name(), target = target.name(), "Decoding");
        decoder
            .decode(path, tags, node, &target, ctx)
            .and_then(|boxed| match boxed.downcast::<T>() {
                Ok(value) => Validated::ok(*value),
                Err(_) => Validated::from_error(ValidationError::decoder_type_mismatch(
                    decoder.name(),
                    target.name(),
                )),
            })
    }

    /// Decode a value that may be absent.
    ///
    /// Absence is not an error: the result is a defaulted `None` with
    /// `MISSING_VALUE` diagnostics downgraded to `MISSING_OPTIONAL_VALUE`.
    pub fn decode_optional<T: 'static>(
        &self,
        path: &str,
        tags: &Tags,
        node: Option<&ConfigNode>,
        ctx: &DecoderContext<'_>,
    ) -> Validated<Option<T>> {
        let type_name = std::any::type_name::<T>();
        if node.is_none() {
            return Validated::defaulted(None, vec![ValidationError::missing_optional_value(path, type_name)]);
        }

        let decoded = self.decode_node_in::<T>(path, tags, node, ctx);
        if decoded.has_results() {
            return decoded.map(Some);
        }

        let (_, errors) = decoded.into_parts();
        if errors.iter().any(|e| e.level == ValidationLevel::Error) {
            return Validated::from_errors(errors);
        }
        let mut errors: Vec<_> = errors
            .into_iter()
            .map(|e| match e.level {
                ValidationLevel::MissingValue => e.with_level(ValidationLevel::MissingOptionalValue),
                _ => e,
            })
            .collect();
        errors.push(ValidationError::missing_optional_value(path, type_name));
        Validated::defaulted(None, errors)
    }

    /// Decode an array, or a comma-separated leaf, element by element.
    ///
    /// Elements that fail are left out and their diagnostics kept. Holes are
    /// `MISSING_VALUE` when `treat_missing_array_index_as_error` is set and
    /// `MISSING_OPTIONAL_VALUE` otherwise.
    pub fn decode_list<T: 'static>(
        &self,
        path: &str,
        tags: &Tags,
        node: Option<&ConfigNode>,
        ctx: &DecoderContext<'_>,
    ) -> Validated<Vec<T>> {
        let type_name = std::any::type_name::<Vec<T>>();
        let mut values = Vec::new();
        let mut errors = Vec::new();

        match node {
            None => return Validated::from_error(ValidationError::missing_value(path)),
            Some(ConfigNode::Array { elements, .. }) => {
                for (index, element) in elements.iter().enumerate() {
                    match element {
                        Some(element) => {
                            let element_path = join_index(path, index);
                            let (value, element_errors) =
                                self.decode_node_in::<T>(&element_path, tags, Some(element), ctx).into_parts();
                            errors.extend(element_errors);
                            values.extend(value);
                        }
                        None => {
                            let level = if ctx.settings.treat_missing_array_index_as_error {
                                ValidationLevel::MissingValue
                            } else {
                                ValidationLevel::MissingOptionalValue
                            };
                            errors.push(ValidationError::missing_array_index(index, path).with_level(level));
                        }
                    }
                }
            }
            Some(ConfigNode::Leaf { value: Some(raw), .. }) => {
                for (index, part) in raw.split(',').map(str::trim).enumerate() {
                    let element = ConfigNode::leaf(part);
                    let element_path = join_index(path, index);
                    let (value, element_errors) =
                        self.decode_node_in::<T>(&element_path, tags, Some(&element), ctx).into_parts();
                    errors.extend(element_errors);
                    values.extend(value);
                }
            }
            Some(ConfigNode::Leaf { value: None, .. }) => {
                return Validated::from_error(ValidationError::leaf_missing_value(path, type_name));
            }
            Some(other) => {
                return Validated::from_error(ValidationError::expected_array(path, other.node_type()));
            }
        }

        Validated::of(Some(values), errors)
    }

    /// Step from `node` through one path segment.
    ///
    /// The segment is tried with each mapper in turn; the first spelling that
    /// resolves wins. If none do, the first mapper's diagnostics are returned.
    pub fn next_node<'a>(&self, path: &str, segment: &str, node: &'a ConfigNode) -> Validated<&'a ConfigNode> {
        let Some(tokens) = self.lexer.scan(path, segment).into_value() else {
            return Validated::from_error(ValidationError::unable_to_tokenize(path, segment));
        };

        let mut first_errors: Option<Vec<ValidationError>> = None;
        for mapper in &self.mappers {
            let Some(mapped) = mapper.map(&tokens) else {
                continue;
            };
            let (found, errors) = navigate(path, node, &mapped).into_parts();
            if let Some(found) = found {
                if first_errors.is_some() {
                    trace!(path, segment, mapper = mapper.name(), "Resolved segment through mapper");
                }
                return Validated::ok(found);
            }
            first_errors.get_or_insert(errors);
        }

        match first_errors {
            Some(errors) if !errors.is_empty() => Validated::from_errors(errors),
            _ => Validated::from_error(ValidationError::missing_value(path)),
        }
    }

    /// Walk a full delimited path from `root`. The empty path is the root.
    pub fn get_node<'a>(&self, path: &str, root: &'a ConfigNode) -> Validated<&'a ConfigNode> {
        let mut current = root;
        for segment in self.lexer.segments(path) {
            let (next, errors) = self.next_node(path, segment, current).into_parts();
            match next {
                Some(node) => current = node,
                None => return Validated::from_errors(errors),
            }
        }
        Validated::ok(current)
    }
}
