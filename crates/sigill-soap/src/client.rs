#![forbid(unsafe_code)]

//! A SOAP client that signs outgoing requests.

use crate::envelope::sign_envelope;
use crate::error::SoapError;
use sigill_core::ns;
use sigill_dsig::XmlDsigAdapter;

/// SOAP protocol version of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoapVersion {
    #[default]
    Soap11,
    Soap12,
}

impl SoapVersion {
    /// The envelope namespace of this version.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => ns::SOAP11_ENV,
            Self::Soap12 => ns::SOAP12_ENV,
        }
    }
}

/// Delivers serialized SOAP requests.
pub trait Transport {
    /// Send `request` to `location` and return the response body. One-way
    /// requests return an empty string.
    fn send(
        &mut self,
        request: &str,
        location: &str,
        action: &str,
        version: SoapVersion,
        one_way: bool,
    ) -> Result<String, SoapError>;

    /// The last request handed to [`send`](Transport::send).
    fn last_request(&self) -> Option<&str>;
}

/// SOAP client with optional XML-DSig signing.
///
/// Without an adapter, requests go to the transport unchanged.
#[derive(Debug)]
pub struct SoapClient<T> {
    transport: T,
    adapter: Option<XmlDsigAdapter>,
    debug_mode: bool,
    last_request: Option<String>,
}

impl<T: Transport> SoapClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, adapter: None, debug_mode: false, last_request: None }
    }

    /// Keep the signed request for [`last_request`](Self::last_request).
    pub fn set_debug_mode(&mut self, enable: bool) -> &mut Self {
        self.debug_mode = enable;
        self
    }

    /// Set the signing adapter, or `None` to stop signing.
    pub fn set_xml_dsig_adapter(&mut self, adapter: Option<XmlDsigAdapter>) -> &mut Self {
        self.adapter = adapter;
        self
    }

    pub fn xml_dsig_adapter(&self) -> Option<&XmlDsigAdapter> {
        self.adapter.as_ref()
    }

    pub fn xml_dsig_adapter_mut(&mut self) -> Option<&mut XmlDsigAdapter> {
        self.adapter.as_mut()
    }

    /// The last request sent. With signing and debug mode on this is the
    /// signed request as recorded by the client, otherwise whatever the
    /// transport reports.
    pub fn last_request(&self) -> Option<&str> {
        if self.adapter.is_some() && self.debug_mode {
            self.last_request.as_deref()
        } else {
            self.transport.last_request()
        }
    }

    /// Sign `request` when an adapter is set, then send it.
    pub fn do_request(
        &mut self,
        request: &str,
        location: &str,
        action: &str,
        version: SoapVersion,
        one_way: bool,
    ) -> Result<String, SoapError> {
        let Some(adapter) = &self.adapter else {
            return self.transport.send(request, location, action, version, one_way);
        };

        let signed = sign_envelope(adapter, request)?;
        tracing::debug!(location, action, "sending signed SOAP request");
        if self.debug_mode {
            self.last_request = Some(signed.clone());
        }
        self.transport.send(&signed, location, action, version, one_way)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
