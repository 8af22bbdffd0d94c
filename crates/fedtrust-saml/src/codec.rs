//! XML marshalling of SAML objects.
//!
//! The writer side is deterministic: the same object always serializes to
//! the same bytes. Signatures depend on that, since they cover the
//! canonical form of this serialization.

use chrono::{DateTime, Utc};

use crate::error::{SamlError, SamlResult};
use crate::signature::{SignatureKeyInfo, SignatureRecord};
use crate::types::{
    Assertion, AssertionPayload, DataKeyInfo, EncryptedAssertion, EncryptedData, EncryptedKey,
    NameIdFormat, ProtocolVersion, Response, StatusCode, Subject, Validity, AM_UNSPECIFIED_SAML1,
    ENVELOPED_SIGNATURE_TRANSFORM, SAML1_ASSERTION_NS, SAML1_PROTOCOL_NS, SAML2_ASSERTION_NS,
    SAML2_PROTOCOL_NS, XMLDSIG11_NS, XMLDSIG_NS, XMLENC_ELEMENT_TYPE, XMLENC_ENCRYPTED_KEY_TYPE,
    XMLENC_NS,
};
use crate::xml::{
    decode_base64, encode_base64, format_instant, parse_instant, XmlElement, XmlWriter,
};

const SAML1_ATTRIBUTE_NAMESPACE: &str = "urn:mace:shibboleth:1.0:attributeNamespace:uri";

// ============================================================================
// Codec Seam
// ============================================================================

/// Converts SAML objects to and from their XML form.
pub trait AssertionCodec: Send + Sync {
    /// Serializes an assertion, including its signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the assertion cannot be represented.
    fn encode_assertion(&self, assertion: &Assertion) -> SamlResult<String>;

    /// Parses an assertion of either protocol version.
    ///
    /// # Errors
    ///
    /// Returns `XmlParse` for malformed input and `InvalidAssertion` for
    /// semantically invalid content.
    fn decode_assertion(&self, xml: &str) -> SamlResult<Assertion>;

    /// Serializes a response, including its signature and payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be represented.
    fn encode_response(&self, response: &Response) -> SamlResult<String>;

    /// Parses a response of either protocol version.
    ///
    /// # Errors
    ///
    /// Returns `XmlParse` for malformed input and `InvalidAssertion` for
    /// semantically invalid content.
    fn decode_response(&self, xml: &str) -> SamlResult<Response>;
}

/// The default XML codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlAssertionCodec;

impl AssertionCodec for XmlAssertionCodec {
    fn encode_assertion(&self, assertion: &Assertion) -> SamlResult<String> {
        assertion_xml(assertion, true)
    }

    fn decode_assertion(&self, xml: &str) -> SamlResult<Assertion> {
        read_assertion(&XmlElement::parse(xml)?)
    }

    fn encode_response(&self, response: &Response) -> SamlResult<String> {
        response_xml(response, true)
    }

    fn decode_response(&self, xml: &str) -> SamlResult<Response> {
        read_response(&XmlElement::parse(xml)?)
    }
}

// ============================================================================
// Writers
// ============================================================================

/// Serializes an assertion, with or without its signature.
pub(crate) fn assertion_xml(assertion: &Assertion, include_signature: bool) -> SamlResult<String> {
    let mut w = XmlWriter::new();
    write_assertion(&mut w, assertion, include_signature);
    Ok(w.finish())
}

/// Serializes a response, with or without its own signature. A carried
/// assertion always keeps its signature.
pub(crate) fn response_xml(response: &Response, include_signature: bool) -> SamlResult<String> {
    let mut w = XmlWriter::new();
    match response.protocol {
        ProtocolVersion::Saml20 => write_saml2_response(&mut w, response, include_signature),
        ProtocolVersion::Saml11 => write_saml1_response(&mut w, response, include_signature)?,
    }
    Ok(w.finish())
}

/// Serializes a standalone `SignedInfo` element with its namespace declared.
pub(crate) fn signed_info_xml(signature: &SignatureRecord) -> String {
    let mut w = XmlWriter::new();
    write_signed_info(&mut w, signature, true);
    w.finish()
}

fn write_assertion(w: &mut XmlWriter, assertion: &Assertion, include_signature: bool) {
    match assertion.protocol {
        ProtocolVersion::Saml20 => write_saml2_assertion(w, assertion, include_signature),
        ProtocolVersion::Saml11 => write_saml1_assertion(w, assertion, include_signature),
    }
}

fn write_saml2_assertion(w: &mut XmlWriter, assertion: &Assertion, include_signature: bool) {
    let issued = format_instant(&assertion.issue_instant);
    w.start(
        "saml:Assertion",
        &[
            ("xmlns:saml", SAML2_ASSERTION_NS),
            ("ID", assertion.id.as_str()),
            ("Version", "2.0"),
            ("IssueInstant", issued.as_str()),
        ],
    );
    if let Some(issuer) = &assertion.issuer {
        w.text_element("saml:Issuer", &[], issuer);
    }
    if include_signature {
        if let Some(signature) = &assertion.signature {
            write_signature(w, signature);
        }
    }

    if let Some(subject) = &assertion.subject {
        w.start("saml:Subject", &[]);
        let mut name_attrs = vec![("Format", subject.format.uri())];
        if let Some(domain) = subject.source_domain.as_deref() {
            name_attrs.push(("NameQualifier", domain));
        }
        w.text_element("saml:NameID", &name_attrs, &subject.identifier);
        w.start("saml:SubjectConfirmation", &[("Method", subject.confirmation_method.as_str())]);
        if let Some(destination) = subject.destination.as_deref() {
            w.empty("saml:SubjectConfirmationData", &[("Recipient", destination)]);
        }
        w.end().end();
    }

    if let Some(validity) = &assertion.validity {
        let not_before = format_instant(&validity.not_before());
        let not_on_or_after = format_instant(&validity.not_on_or_after());
        w.empty(
            "saml:Conditions",
            &[("NotBefore", not_before.as_str()), ("NotOnOrAfter", not_on_or_after.as_str())],
        );
    }

    if let Some(class) = &assertion.authn_context_class {
        w.start("saml:AuthnStatement", &[("AuthnInstant", issued.as_str())])
            .start("saml:AuthnContext", &[])
            .text_element("saml:AuthnContextClassRef", &[], class)
            .end()
            .end();
    }

    if !assertion.attributes.is_empty() {
        w.start("saml:AttributeStatement", &[]);
        for (name, value) in &assertion.attributes {
            w.start("saml:Attribute", &[("Name", name.as_str())])
                .text_element("saml:AttributeValue", &[], value)
                .end();
        }
        w.end();
    }
    w.end();
}

fn write_saml1_subject(w: &mut XmlWriter, subject: &Subject) {
    w.start("saml1:Subject", &[]);
    let mut name_attrs = vec![("Format", subject.format.uri())];
    if let Some(domain) = subject.source_domain.as_deref() {
        name_attrs.push(("NameQualifier", domain));
    }
    w.text_element("saml1:NameIdentifier", &name_attrs, &subject.identifier);
    w.start("saml1:SubjectConfirmation", &[]);
    w.text_element("saml1:ConfirmationMethod", &[], &subject.confirmation_method);
    if let Some(destination) = subject.destination.as_deref() {
        w.text_element("saml1:SubjectConfirmationData", &[], destination);
    }
    w.end().end();
}

fn write_saml1_assertion(w: &mut XmlWriter, assertion: &Assertion, include_signature: bool) {
    let issued = format_instant(&assertion.issue_instant);
    let mut attrs = vec![
        ("xmlns:saml1", SAML1_ASSERTION_NS),
        ("MajorVersion", "1"),
        ("MinorVersion", "1"),
        ("AssertionID", assertion.id.as_str()),
    ];
    if let Some(issuer) = assertion.issuer.as_deref() {
        attrs.push(("Issuer", issuer));
    }
    attrs.push(("IssueInstant", issued.as_str()));
    w.start("saml1:Assertion", &attrs);

    if let Some(validity) = &assertion.validity {
        let not_before = format_instant(&validity.not_before());
        let not_on_or_after = format_instant(&validity.not_on_or_after());
        w.empty(
            "saml1:Conditions",
            &[("NotBefore", not_before.as_str()), ("NotOnOrAfter", not_on_or_after.as_str())],
        );
    }

    if assertion.subject.is_some() || assertion.authn_context_class.is_some() {
        let method = assertion
            .authn_context_class
            .as_deref()
            .unwrap_or(AM_UNSPECIFIED_SAML1);
        w.start(
            "saml1:AuthenticationStatement",
            &[("AuthenticationMethod", method), ("AuthenticationInstant", issued.as_str())],
        );
        if let Some(subject) = &assertion.subject {
            write_saml1_subject(w, subject);
        }
        w.end();
    }

    if !assertion.attributes.is_empty() {
        w.start("saml1:AttributeStatement", &[]);
        if let Some(subject) = &assertion.subject {
            write_saml1_subject(w, subject);
        }
        for (name, value) in &assertion.attributes {
            w.start(
                "saml1:Attribute",
                &[
                    ("AttributeName", name.as_str()),
                    ("AttributeNamespace", SAML1_ATTRIBUTE_NAMESPACE),
                ],
            )
            .text_element("saml1:AttributeValue", &[], value)
            .end();
        }
        w.end();
    }

    if include_signature {
        if let Some(signature) = &assertion.signature {
            write_signature(w, signature);
        }
    }
    w.end();
}

fn write_saml2_response(w: &mut XmlWriter, response: &Response, include_signature: bool) {
    let issued = format_instant(&response.issue_instant);
    let mut attrs = vec![
        ("xmlns:samlp", SAML2_PROTOCOL_NS),
        ("xmlns:saml", SAML2_ASSERTION_NS),
        ("ID", response.id.as_str()),
        ("Version", "2.0"),
        ("IssueInstant", issued.as_str()),
    ];
    if let Some(destination) = response.destination.as_deref() {
        attrs.push(("Destination", destination));
    }
    if let Some(in_response_to) = response.in_response_to.as_deref() {
        attrs.push(("InResponseTo", in_response_to));
    }
    w.start("samlp:Response", &attrs);

    if let Some(issuer) = &response.issuer {
        w.text_element("saml:Issuer", &[], issuer);
    }
    if include_signature {
        if let Some(signature) = &response.signature {
            write_signature(w, signature);
        }
    }
    w.start("samlp:Status", &[])
        .empty(
            "samlp:StatusCode",
            &[("Value", response.status.value(ProtocolVersion::Saml20))],
        )
        .end();

    match &response.payload {
        Some(AssertionPayload::Plain(assertion)) => write_assertion(w, assertion, true),
        Some(AssertionPayload::Encrypted(encrypted)) => write_encrypted_assertion(w, encrypted),
        None => {}
    }
    w.end();
}

fn write_saml1_response(
    w: &mut XmlWriter,
    response: &Response,
    include_signature: bool,
) -> SamlResult<()> {
    let issued = format_instant(&response.issue_instant);
    let mut attrs = vec![
        ("xmlns:samlp1", SAML1_PROTOCOL_NS),
        ("MajorVersion", "1"),
        ("MinorVersion", "1"),
        ("ResponseID", response.id.as_str()),
        ("IssueInstant", issued.as_str()),
    ];
    if let Some(recipient) = response.destination.as_deref() {
        attrs.push(("Recipient", recipient));
    }
    if let Some(in_response_to) = response.in_response_to.as_deref() {
        attrs.push(("InResponseTo", in_response_to));
    }
    w.start("samlp1:Response", &attrs);

    if include_signature {
        if let Some(signature) = &response.signature {
            write_signature(w, signature);
        }
    }
    w.start("samlp1:Status", &[])
        .empty(
            "samlp1:StatusCode",
            &[("Value", response.status.value(ProtocolVersion::Saml11))],
        )
        .end();

    match &response.payload {
        Some(AssertionPayload::Plain(assertion)) => write_assertion(w, assertion, true),
        Some(AssertionPayload::Encrypted(_)) => {
            return Err(SamlError::Encryption(
                "SAML 1.1 responses cannot carry encrypted assertions".to_string(),
            ));
        }
        None => {}
    }
    w.end();
    Ok(())
}

fn write_encrypted_assertion(w: &mut XmlWriter, encrypted: &EncryptedAssertion) {
    w.start(
        "saml:EncryptedAssertion",
        &[("xmlns:saml", SAML2_ASSERTION_NS)],
    );
    write_encrypted_data(w, &encrypted.encrypted_data);
    for key in &encrypted.encrypted_keys {
        write_encrypted_key(w, key);
    }
    w.end();
}

fn write_encrypted_data(w: &mut XmlWriter, data: &EncryptedData) {
    let mut attrs = vec![("xmlns:xenc", XMLENC_NS)];
    if let Some(id) = data.id.as_deref() {
        attrs.push(("Id", id));
    }
    attrs.push(("Type", XMLENC_ELEMENT_TYPE));
    w.start("xenc:EncryptedData", &attrs);
    w.empty("xenc:EncryptionMethod", &[("Algorithm", data.algorithm.as_str())]);

    if let Some(key_info) = &data.key_info {
        w.start("ds:KeyInfo", &[("xmlns:ds", XMLDSIG_NS)]);
        match key_info {
            DataKeyInfo::Inline(key) => write_encrypted_key(w, key),
            DataKeyInfo::RetrievalMethod { uri } => {
                w.empty(
                    "ds:RetrievalMethod",
                    &[("URI", uri.as_str()), ("Type", XMLENC_ENCRYPTED_KEY_TYPE)],
                );
            }
            DataKeyInfo::KeyName(name) => {
                w.text_element("ds:KeyName", &[], name);
            }
        }
        w.end();
    }

    w.start("xenc:CipherData", &[])
        .text_element("xenc:CipherValue", &[], &encode_base64(&data.cipher_value))
        .end();
    w.end();
}

fn write_encrypted_key(w: &mut XmlWriter, key: &EncryptedKey) {
    let mut attrs = vec![("xmlns:xenc", XMLENC_NS)];
    if let Some(id) = key.id.as_deref() {
        attrs.push(("Id", id));
    }
    if let Some(recipient) = key.recipient.as_deref() {
        attrs.push(("Recipient", recipient));
    }
    w.start("xenc:EncryptedKey", &attrs);
    w.empty("xenc:EncryptionMethod", &[("Algorithm", key.algorithm.as_str())]);
    if let Some(name) = &key.key_name {
        w.start("ds:KeyInfo", &[("xmlns:ds", XMLDSIG_NS)])
            .text_element("ds:KeyName", &[], name)
            .end();
    }
    w.start("xenc:CipherData", &[])
        .text_element("xenc:CipherValue", &[], &encode_base64(&key.cipher_value))
        .end();
    if let Some(carried) = &key.carried_key_name {
        w.text_element("xenc:CarriedKeyName", &[], carried);
    }
    w.end();
}

fn write_signed_info(w: &mut XmlWriter, signature: &SignatureRecord, declare_namespace: bool) {
    if declare_namespace {
        w.start("ds:SignedInfo", &[("xmlns:ds", XMLDSIG_NS)]);
    } else {
        w.start("ds:SignedInfo", &[]);
    }
    w.empty(
        "ds:CanonicalizationMethod",
        &[("Algorithm", signature.canonicalization.as_str())],
    )
    .empty("ds:SignatureMethod", &[("Algorithm", signature.algorithm.as_str())])
    .start("ds:Reference", &[("URI", signature.reference_uri.as_str())])
    .start("ds:Transforms", &[])
    .empty("ds:Transform", &[("Algorithm", ENVELOPED_SIGNATURE_TRANSFORM)])
    .empty("ds:Transform", &[("Algorithm", signature.canonicalization.as_str())])
    .end()
    .empty("ds:DigestMethod", &[("Algorithm", signature.digest_algorithm.as_str())])
    .text_element("ds:DigestValue", &[], &encode_base64(&signature.digest_value))
    .end()
    .end();
}

fn write_signature(w: &mut XmlWriter, signature: &SignatureRecord) {
    w.start("ds:Signature", &[("xmlns:ds", XMLDSIG_NS)]);
    write_signed_info(w, signature, false);
    w.text_element(
        "ds:SignatureValue",
        &[],
        &encode_base64(&signature.signature_value),
    );
    match &signature.key_info {
        Some(SignatureKeyInfo::Certificate(der)) => {
            w.start("ds:KeyInfo", &[])
                .start("ds:X509Data", &[])
                .text_element("ds:X509Certificate", &[], &encode_base64(der))
                .end()
                .end();
        }
        Some(SignatureKeyInfo::PublicKey(der)) => {
            w.start("ds:KeyInfo", &[])
                .text_element(
                    "dsig11:DEREncodedKeyValue",
                    &[("xmlns:dsig11", XMLDSIG11_NS)],
                    &encode_base64(der),
                )
                .end();
        }
        None => {}
    }
    w.end();
}

// ============================================================================
// Readers
// ============================================================================

/// Decodes an `Assertion` element of either protocol version.
pub(crate) fn read_assertion(element: &XmlElement) -> SamlResult<Assertion> {
    if element.is(SAML2_ASSERTION_NS, "Assertion") {
        read_saml2_assertion(element)
    } else if element.is(SAML1_ASSERTION_NS, "Assertion") {
        read_saml1_assertion(element)
    } else {
        Err(SamlError::XmlParse(format!(
            "expected an Assertion element, found {}",
            element.name
        )))
    }
}

/// Decodes a `Response` element of either protocol version.
pub(crate) fn read_response(element: &XmlElement) -> SamlResult<Response> {
    if element.is(SAML2_PROTOCOL_NS, "Response") {
        read_saml2_response(element)
    } else if element.is(SAML1_PROTOCOL_NS, "Response") {
        read_saml1_response(element)
    } else {
        Err(SamlError::XmlParse(format!(
            "expected a Response element, found {}",
            element.name
        )))
    }
}

fn optional_instant(element: &XmlElement, name: &str) -> SamlResult<Option<DateTime<Utc>>> {
    element.attribute(name).map(parse_instant).transpose()
}

fn read_validity(conditions: Option<&XmlElement>) -> SamlResult<Option<Validity>> {
    match conditions {
        Some(c) => Validity::from_bounds(
            optional_instant(c, "NotBefore")?,
            optional_instant(c, "NotOnOrAfter")?,
        ),
        None => Ok(None),
    }
}

fn find_signature(element: &XmlElement) -> SamlResult<Option<SignatureRecord>> {
    element
        .children
        .iter()
        .find(|c| c.is(XMLDSIG_NS, "Signature"))
        .map(read_signature)
        .transpose()
}

fn name_format(element: &XmlElement) -> NameIdFormat {
    element
        .attribute("Format")
        .and_then(NameIdFormat::from_uri)
        .unwrap_or_default()
}

fn read_saml2_assertion(element: &XmlElement) -> SamlResult<Assertion> {
    let version = element.required_attribute("Version")?;
    if version != "2.0" {
        return Err(SamlError::InvalidAssertion(format!(
            "unsupported assertion version {version}"
        )));
    }

    let subject = element.child("Subject").map(|s| {
        let name_id = s.child("NameID");
        let confirmation = s.child("SubjectConfirmation");
        Subject {
            identifier: name_id.map(|n| n.text.clone()).unwrap_or_default(),
            format: name_id.map(name_format).unwrap_or_default(),
            confirmation_method: confirmation
                .and_then(|c| c.attribute("Method"))
                .unwrap_or_default()
                .to_string(),
            source_domain: name_id
                .and_then(|n| n.attribute("NameQualifier"))
                .map(str::to_string),
            destination: confirmation
                .and_then(|c| c.child("SubjectConfirmationData"))
                .and_then(|d| d.attribute("Recipient"))
                .map(str::to_string),
        }
    });

    let authn_context_class = element
        .child("AuthnStatement")
        .and_then(|s| s.child("AuthnContext"))
        .and_then(|c| c.child_text("AuthnContextClassRef"))
        .map(str::to_string);

    let mut attributes = Vec::new();
    for statement in element.children_named("AttributeStatement") {
        for attribute in statement.children_named("Attribute") {
            let name = attribute.required_attribute("Name")?;
            push_values(&mut attributes, name, attribute);
        }
    }

    Ok(Assertion {
        id: element.required_attribute("ID")?.to_string(),
        protocol: ProtocolVersion::Saml20,
        issue_instant: parse_instant(element.required_attribute("IssueInstant")?)?,
        issuer: element.child_text("Issuer").map(str::to_string),
        subject,
        validity: read_validity(element.child("Conditions"))?,
        authn_context_class,
        attributes,
        signature: find_signature(element)?,
    })
}

fn push_values(attributes: &mut Vec<(String, String)>, name: &str, attribute: &XmlElement) {
    let before = attributes.len();
    for value in attribute.children_named("AttributeValue") {
        attributes.push((name.to_string(), value.text.clone()));
    }
    if attributes.len() == before {
        attributes.push((name.to_string(), String::new()));
    }
}

fn read_saml1_subject(element: &XmlElement) -> Subject {
    let name_id = element.child("NameIdentifier");
    let confirmation = element.child("SubjectConfirmation");
    Subject {
        identifier: name_id.map(|n| n.text.clone()).unwrap_or_default(),
        format: name_id.map(name_format).unwrap_or_default(),
        confirmation_method: confirmation
            .and_then(|c| c.child_text("ConfirmationMethod"))
            .unwrap_or_default()
            .to_string(),
        source_domain: name_id
            .and_then(|n| n.attribute("NameQualifier"))
            .map(str::to_string),
        destination: confirmation
            .and_then(|c| c.child_text("SubjectConfirmationData"))
            .map(str::to_string),
    }
}

fn read_saml1_assertion(element: &XmlElement) -> SamlResult<Assertion> {
    let major = element.required_attribute("MajorVersion")?;
    let minor = element.required_attribute("MinorVersion")?;
    if major != "1" || !matches!(minor, "0" | "1") {
        return Err(SamlError::InvalidAssertion(format!(
            "unsupported assertion version {major}.{minor}"
        )));
    }

    let authn = element.child("AuthenticationStatement");
    let attribute_statements: Vec<&XmlElement> =
        element.children_named("AttributeStatement").collect();

    let subject = authn
        .and_then(|s| s.child("Subject"))
        .or_else(|| attribute_statements.iter().find_map(|s| s.child("Subject")))
        .map(read_saml1_subject);

    let authn_context_class = authn
        .and_then(|s| s.attribute("AuthenticationMethod"))
        .filter(|m| *m != AM_UNSPECIFIED_SAML1)
        .map(str::to_string);

    let mut attributes = Vec::new();
    for statement in attribute_statements {
        for attribute in statement.children_named("Attribute") {
            let name = attribute.required_attribute("AttributeName")?;
            push_values(&mut attributes, name, attribute);
        }
    }

    Ok(Assertion {
        id: element.required_attribute("AssertionID")?.to_string(),
        protocol: ProtocolVersion::Saml11,
        issue_instant: parse_instant(element.required_attribute("IssueInstant")?)?,
        issuer: element.attribute("Issuer").map(str::to_string),
        subject,
        validity: read_validity(element.child("Conditions"))?,
        authn_context_class,
        attributes,
        signature: find_signature(element)?,
    })
}

fn read_status(element: &XmlElement) -> SamlResult<StatusCode> {
    let value = element
        .child("Status")
        .and_then(|s| s.child("StatusCode"))
        .and_then(|c| c.attribute("Value"))
        .ok_or_else(|| SamlError::XmlParse("response has no status code".to_string()))?;
    Ok(StatusCode::from_value(value))
}

fn read_saml2_response(element: &XmlElement) -> SamlResult<Response> {
    let version = element.required_attribute("Version")?;
    if version != "2.0" {
        return Err(SamlError::InvalidAssertion(format!(
            "unsupported response version {version}"
        )));
    }

    let payload = if let Some(assertion) = element
        .children
        .iter()
        .find(|c| c.is(SAML2_ASSERTION_NS, "Assertion"))
    {
        Some(AssertionPayload::Plain(Box::new(read_saml2_assertion(assertion)?)))
    } else if let Some(encrypted) = element
        .children
        .iter()
        .find(|c| c.is(SAML2_ASSERTION_NS, "EncryptedAssertion"))
    {
        Some(AssertionPayload::Encrypted(read_encrypted_assertion(encrypted)?))
    } else {
        None
    };

    Ok(Response {
        id: element.required_attribute("ID")?.to_string(),
        protocol: ProtocolVersion::Saml20,
        issue_instant: parse_instant(element.required_attribute("IssueInstant")?)?,
        issuer: element.child_text("Issuer").map(str::to_string),
        destination: element.attribute("Destination").map(str::to_string),
        in_response_to: element.attribute("InResponseTo").map(str::to_string),
        status: read_status(element)?,
        payload,
        signature: find_signature(element)?,
    })
}

fn read_saml1_response(element: &XmlElement) -> SamlResult<Response> {
    let major = element.required_attribute("MajorVersion")?;
    if major != "1" {
        return Err(SamlError::InvalidAssertion(format!(
            "unsupported response version {major}"
        )));
    }

    let payload = element
        .children
        .iter()
        .find(|c| c.is(SAML1_ASSERTION_NS, "Assertion"))
        .map(read_saml1_assertion)
        .transpose()?
        .map(|a| AssertionPayload::Plain(Box::new(a)));

    Ok(Response {
        id: element.required_attribute("ResponseID")?.to_string(),
        protocol: ProtocolVersion::Saml11,
        issue_instant: parse_instant(element.required_attribute("IssueInstant")?)?,
        issuer: None,
        destination: element.attribute("Recipient").map(str::to_string),
        in_response_to: element.attribute("InResponseTo").map(str::to_string),
        status: read_status(element)?,
        payload,
        signature: find_signature(element)?,
    })
}

fn read_encrypted_assertion(element: &XmlElement) -> SamlResult<EncryptedAssertion> {
    let data = element
        .children
        .iter()
        .find(|c| c.is(XMLENC_NS, "EncryptedData"))
        .ok_or_else(|| SamlError::XmlParse("EncryptedAssertion has no EncryptedData".into()))?;

    let key_info = match data.child("KeyInfo") {
        Some(info) => {
            if let Some(key) = info.child("EncryptedKey") {
                Some(DataKeyInfo::Inline(Box::new(read_encrypted_key(key)?)))
            } else if let Some(method) = info.child("RetrievalMethod") {
                Some(DataKeyInfo::RetrievalMethod {
                    uri: method.required_attribute("URI")?.to_string(),
                })
            } else {
                info.child_text("KeyName")
                    .map(|n| DataKeyInfo::KeyName(n.to_string()))
            }
        }
        None => None,
    };

    let encrypted_keys = element
        .children
        .iter()
        .filter(|c| c.is(XMLENC_NS, "EncryptedKey"))
        .map(read_encrypted_key)
        .collect::<SamlResult<Vec<_>>>()?;

    Ok(EncryptedAssertion {
        encrypted_data: EncryptedData {
            id: data.attribute("Id").map(str::to_string),
            algorithm: encryption_method(data)?,
            key_info,
            cipher_value: cipher_value(data)?,
        },
        encrypted_keys,
    })
}

fn read_encrypted_key(element: &XmlElement) -> SamlResult<EncryptedKey> {
    Ok(EncryptedKey {
        id: element.attribute("Id").map(str::to_string),
        recipient: element.attribute("Recipient").map(str::to_string),
        algorithm: encryption_method(element)?,
        key_name: element
            .child("KeyInfo")
            .and_then(|k| k.child_text("KeyName"))
            .map(str::to_string),
        carried_key_name: element
            .child_text("CarriedKeyName")
            .map(str::to_string),
        cipher_value: cipher_value(element)?,
    })
}

fn encryption_method(element: &XmlElement) -> SamlResult<String> {
    element
        .child("EncryptionMethod")
        .and_then(|m| m.attribute("Algorithm"))
        .map(str::to_string)
        .ok_or_else(|| SamlError::XmlParse(format!("{} has no EncryptionMethod", element.name)))
}

fn cipher_value(element: &XmlElement) -> SamlResult<Vec<u8>> {
    let text = element
        .child("CipherData")
        .and_then(|d| d.child_text("CipherValue"))
        .ok_or_else(|| SamlError::XmlParse(format!("{} has no CipherValue", element.name)))?;
    decode_base64(text)
}

fn read_signature(element: &XmlElement) -> SamlResult<SignatureRecord> {
    let signed_info = element
        .child("SignedInfo")
        .ok_or_else(|| SamlError::SignatureEngine("Signature has no SignedInfo".into()))?;
    let reference = signed_info
        .child("Reference")
        .ok_or_else(|| SamlError::SignatureEngine("SignedInfo has no Reference".into()))?;

    let algorithm_of = |parent: &XmlElement, name: &str| -> SamlResult<String> {
        parent
            .child(name)
            .and_then(|m| m.attribute("Algorithm"))
            .map(str::to_string)
            .ok_or_else(|| SamlError::SignatureEngine(format!("signature has no {name}")))
    };

    let digest_value = reference
        .child_text("DigestValue")
        .map(decode_base64)
        .transpose()?
        .unwrap_or_default();
    let signature_value = element
        .child_text("SignatureValue")
        .map(decode_base64)
        .transpose()?
        .unwrap_or_default();

    let key_info = match element.child("KeyInfo") {
        Some(info) => {
            if let Some(cert) = info
                .child("X509Data")
                .and_then(|d| d.child_text("X509Certificate"))
            {
                Some(SignatureKeyInfo::Certificate(decode_base64(cert)?))
            } else {
                info.child_text("DEREncodedKeyValue")
                    .map(decode_base64)
                    .transpose()?
                    .map(SignatureKeyInfo::PublicKey)
            }
        }
        None => None,
    };

    Ok(SignatureRecord {
        algorithm: algorithm_of(signed_info, "SignatureMethod")?,
        canonicalization: algorithm_of(signed_info, "CanonicalizationMethod")?,
        reference_uri: reference.attribute("URI").unwrap_or_default().to_string(),
        digest_algorithm: algorithm_of(reference, "DigestMethod")?,
        digest_value,
        signature_value,
        key_info,
    })
}
