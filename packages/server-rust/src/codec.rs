//! XML payload codec backed by `quick-xml`.

use std::borrow::Cow;

use actionwire_core::{
    OutboundMessage, ParameterBinding, PayloadSource, Value, WrapperType, XmlElement,
};
use tracing::trace;

use crate::service::operation::{CodecError, ResponsePayload};
use crate::traits::PayloadCodec;

/// Decodes wrappers through their serde hooks and direct parameters through
/// the text form of their type.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlCodec;

impl XmlCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The payload root as standalone XML, or `None` for an empty body.
    fn root_xml(source: &PayloadSource) -> Result<Option<Cow<'_, str>>, CodecError> {
        match source {
            PayloadSource::Tree(body) => Ok(body
                .first_element_child()
                .map(|root| Cow::Owned(root.to_local_xml()))),
            PayloadSource::Stream(bytes) => {
                let text = std::str::from_utf8(bytes)?.trim();
                Ok((!text.is_empty()).then_some(Cow::Borrowed(text)))
            }
        }
    }
}

impl PayloadCodec for XmlCodec {
    fn unmarshal(
        &self,
        source: &PayloadSource,
        wrapper: &WrapperType,
    ) -> Result<Option<Value>, CodecError> {
        let Some(xml) = Self::root_xml(source)? else {
            return Ok(None);
        };
        trace!(wrapper = wrapper.name(), source = source.kind(), "decoding request wrapper");
        match wrapper.decode_xml(&xml) {
            Some(decoded) => decoded.map(Some).map_err(|reason| CodecError::Decode {
                target: wrapper.name(),
                reason,
            }),
            None => Err(CodecError::Unsupported {
                target: wrapper.name(),
            }),
        }
    }

    fn resolve_argument(
        &self,
        source: &PayloadSource,
        binding: &ParameterBinding,
    ) -> Result<Value, CodecError> {
        let missing = || CodecError::MissingElement {
            wire_name: binding.wire_name.clone(),
        };
        let parsed;
        let root = match source {
            PayloadSource::Tree(body) => body.first_element_child().ok_or_else(missing)?,
            PayloadSource::Stream(bytes) => {
                parsed = XmlElement::parse(std::str::from_utf8(bytes)?)?;
                &parsed
            }
        };
        let element = if root.local_name() == binding.wire_name {
            root
        } else {
            root.child(&binding.wire_name).ok_or_else(missing)?
        };

        let target = binding.target_type;
        target
            .parse(&element.text())
            .ok_or(CodecError::Unsupported {
                target: target.name(),
            })?
            .map_err(|reason| CodecError::Decode {
                target: target.name(),
                reason,
            })
    }

    fn marshal(
        &self,
        response: &ResponsePayload,
        sink: &mut OutboundMessage,
    ) -> Result<(), CodecError> {
        match response {
            ResponsePayload::Empty => {}
            ResponsePayload::Wrapped {
                value,
                wrapper,
                element,
            } => {
                let xml = wrapper
                    .encode_xml(value, element)
                    .ok_or(CodecError::Unsupported {
                        target: wrapper.name(),
                    })?
                    .map_err(|reason| CodecError::Encode {
                        target: wrapper.name(),
                        reason,
                    })?;
                sink.write(xml);
            }
            ResponsePayload::Direct {
                value,
                value_type,
                element,
            } => {
                let text = value_type.render(value).ok_or(CodecError::Unsupported {
                    target: value_type.name(),
                })?;
                sink.write(XmlElement::new(element.as_str()).with_text(text).to_local_xml());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
