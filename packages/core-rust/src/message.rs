//! Inbound and outbound messages at the transport boundary.

use bytes::Bytes;

use crate::xml::{XmlElement, XmlError};

/// SOAP 1.1 envelope namespace, used when rendering responses.
pub const SOAP11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

// ---------------------------------------------------------------------------
// PayloadSource
// ---------------------------------------------------------------------------

/// Structural content of a message body.
#[derive(Debug, Clone)]
pub enum PayloadSource {
    /// Parsed node tree of the body container; the payload root is its first
    /// element child.
    Tree(XmlElement),
    /// Unparsed payload bytes (the payload root element itself).
    Stream(Bytes),
}

impl PayloadSource {
    /// The payload root of a tree source. `None` for an empty body or a stream.
    #[must_use]
    pub fn tree_root(&self) -> Option<&XmlElement> {
        match self {
            Self::Tree(body) => body.first_element_child(),
            Self::Stream(_) => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tree(_) => "tree",
            Self::Stream(_) => "stream",
        }
    }
}

// ---------------------------------------------------------------------------
// InboundMessage
// ---------------------------------------------------------------------------

/// A request as handed over by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Raw action string as sent on the wire (untrimmed).
    pub action: Option<String>,
    pub payload: PayloadSource,
    /// Assigned by the dispatcher; 0 until then.
    pub call_id: u64,
}

impl InboundMessage {
    #[must_use]
    pub fn new(payload: PayloadSource) -> Self {
        Self {
            action: None,
            payload,
            call_id: 0,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Builds a message from a SOAP envelope, keeping its `Body` as a tree.
    ///
    /// A document without an `Envelope` root is taken as the body itself.
    ///
    /// # Errors
    ///
    /// Fails if the document is not well-formed or the envelope has no body.
    pub fn from_envelope(xml: &str, action: Option<&str>) -> Result<Self, XmlError> {
        let root = XmlElement::parse(xml)?;
        let body = if root.local_name() == "Envelope" {
            root.child("Body").cloned().ok_or(XmlError::NoRootElement)?
        } else {
            root
        };
        Ok(Self {
            action: action.map(str::to_string),
            payload: PayloadSource::Tree(body),
            call_id: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// OutboundMessage
// ---------------------------------------------------------------------------

/// Result sink: the serialized response payload, if any.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub call_id: u64,
    pub action: Option<String>,
    payload: Option<String>,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(call_id: u64) -> Self {
        Self {
            call_id,
            ..Self::default()
        }
    }

    /// Writes (or replaces) the payload.
    pub fn write(&mut self, payload: impl Into<String>) {
        self.payload = Some(payload.into());
    }

    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        self.payload.is_some()
    }

    /// Renders a SOAP 1.1 envelope around the payload.
    #[must_use]
    pub fn into_envelope(self) -> String {
        format!(
            "<soap:Envelope xmlns:soap=\"{SOAP11_ENVELOPE_NS}\"><soap:Body>{}</soap:Body></soap:Envelope>",
            self.payload.unwrap_or_default()
        )
    }
}
