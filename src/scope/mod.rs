// Scoped document module: one parsed response plus a focus element

pub mod matcher;

use std::fmt::Display;
use std::rc::Rc;

use crate::error::CallScopeError;
use crate::twiml::message::{Document, Element, ElementKind, NodeId};
use crate::twiml::parser::{parse_document, ParseError};
use crate::twiml::uri::SipUri;

pub use matcher::{normalize_url, AttributeMatch, ElementQuery, TextMatch};

/// Target of a `<Redirect>`: its text and optional `method` attribute
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectTarget {
    pub url: String,
    pub method: Option<String>,
}

/// A parsed document and the element queries are evaluated against.
///
/// Predicates look at the focus itself and its direct children, so a `<Say>`
/// nested in a `<Gather>` is only visible from a scope focused on that gather.
/// Cloning is cheap; the document itself is shared.
#[derive(Debug, Clone)]
pub struct ScopedDocument {
    document: Rc<Document>,
    focus: NodeId,
}

impl ScopedDocument {
    /// Scope focused on the document root
    pub fn new(document: Document) -> Self {
        let focus = document.root();
        ScopedDocument {
            document: Rc::new(document),
            focus,
        }
    }

    pub fn parse(body: &str) -> Result<Self, ParseError> {
        parse_document(body).map(Self::new)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn focus(&self) -> NodeId {
        self.focus
    }

    pub fn focus_element(&self) -> &Element {
        self.document.get(self.focus)
    }

    /// True iff the focus element itself is of `kind`
    pub fn is_a(&self, kind: &ElementKind) -> bool {
        self.focus_element().is(kind)
    }

    /// Trimmed text of the focus and its descendants
    pub fn inner_text(&self) -> String {
        self.document.inner_text(self.focus)
    }

    pub fn children(&self) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        self.document.children(self.focus)
    }

    /// The focus followed by its direct children: everything a query sees
    fn candidates(&self) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        std::iter::once((self.focus, self.focus_element())).chain(self.children())
    }

    /// First of the focus and its children matching `query`
    pub fn find(&self, query: &ElementQuery<'_>) -> Option<NodeId> {
        self.candidates()
            .map(|(id, _)| id)
            .find(|&id| query.matches(&self.document, id))
    }

    pub fn has_element(&self, query: &ElementQuery<'_>) -> bool {
        self.find(query).is_some()
    }

    /// New scope focused on the first element of `kind` (the focus or a child)
    pub fn within(&self, kind: ElementKind) -> Result<ScopedDocument, CallScopeError> {
        match self.find(&ElementQuery::new(kind.clone())) {
            Some(focus) => Ok(ScopedDocument {
                document: Rc::clone(&self.document),
                focus,
            }),
            None => Err(CallScopeError::NoElementInScope(kind)),
        }
    }

    fn has_kind(&self, kind: ElementKind) -> bool {
        self.has_element(&ElementQuery::new(kind))
    }

    fn has_text(&self, kind: ElementKind, text: TextMatch<'_>) -> bool {
        self.has_element(&ElementQuery::new(kind).text(text))
    }

    // --- redirect ---

    /// First `<Redirect>` with a non-empty target
    pub fn redirect(&self) -> Option<RedirectTarget> {
        self.candidates()
            .filter(|(_, el)| el.is(&ElementKind::Redirect))
            .map(|(id, el)| RedirectTarget {
                url: self.document.inner_text(id),
                method: el.attribute("method").map(str::to_string),
            })
            .find(|target| !target.url.is_empty())
    }

    pub fn has_redirect(&self) -> bool {
        self.redirect().is_some()
    }

    /// Compares after stripping a `.xml` suffix on both sides
    pub fn has_redirect_to(&self, url: &str) -> bool {
        let wanted = normalize_url(url);
        self.candidates()
            .filter(|(_, el)| el.is(&ElementKind::Redirect))
            .any(|(id, _)| normalize_url(&self.document.inner_text(id)) == wanted)
    }

    // --- verbs ---

    pub fn has_say(&self, text: &str) -> bool {
        self.has_text(ElementKind::Say, TextMatch::Contains(text))
    }

    pub fn has_play(&self, path: &str) -> bool {
        self.has_text(ElementKind::Play, TextMatch::Contains(path))
    }

    pub fn has_play_exact(&self, path: &str) -> bool {
        self.has_text(ElementKind::Play, TextMatch::Exact(path))
    }

    pub fn has_dial(&self, number: &str) -> bool {
        self.has_text(ElementKind::Dial, TextMatch::Contains(number))
    }

    pub fn has_hangup(&self) -> bool {
        self.has_kind(ElementKind::Hangup)
    }

    pub fn has_gather(&self) -> bool {
        self.has_kind(ElementKind::Gather)
    }

    pub fn has_record(&self) -> bool {
        self.has_kind(ElementKind::Record)
    }

    pub fn has_action_on(&self, kind: ElementKind, url: &str) -> bool {
        self.has_element(&ElementQuery::new(kind).attribute("action", AttributeMatch::Equals(url)))
    }

    pub fn has_max_length_on_record(&self, value: impl Display) -> bool {
        let value = value.to_string();
        self.has_element(
            &ElementQuery::new(ElementKind::Record)
                .attribute("maxLength", AttributeMatch::Equals(value.as_str())),
        )
    }

    pub fn has_finish_on_key_on_record(&self, key: &str) -> bool {
        self.has_element(
            &ElementQuery::new(ElementKind::Record)
                .attribute("finishOnKey", AttributeMatch::Equals(key)),
        )
    }

    // --- sip ---

    fn sip_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.candidates()
            .filter(|(_, el)| el.is(&ElementKind::Sip))
            .map(|(id, _)| id)
    }

    pub fn has_sip(&self) -> bool {
        self.has_kind(ElementKind::Sip)
    }

    pub fn has_uri_on_sip(&self, uri: &str) -> bool {
        self.sip_nodes()
            .any(|id| self.document.inner_text(id).contains(uri))
    }

    pub fn has_username_on_uri(&self, name: &str) -> bool {
        self.sip_nodes()
            .any(|id| self.sip_credential(id, "username").as_deref() == Some(name))
    }

    pub fn has_password_on_uri(&self, password: &str) -> bool {
        self.sip_nodes()
            .any(|id| self.sip_credential(id, "password").as_deref() == Some(password))
    }

    /// Credential from the attribute, or from the URI userinfo as a fallback
    fn sip_credential(&self, id: NodeId, attribute: &str) -> Option<String> {
        if let Some(value) = self.document.get(id).attribute(attribute) {
            return Some(value.to_string());
        }
        let text = self.document.inner_text(id);
        let uri = SipUri::parse(&text)?;
        let value = match attribute {
            "username" => uri.user,
            _ => uri.password,
        };
        value.map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(body: &str) -> ScopedDocument {
        ScopedDocument::parse(body).expect("test document should parse")
    }

    const START: &str = r##"<Response>
  <Gather action="/twilio/test_action" finishOnKey="#">
    <Say>Please enter some digits.</Say>
  </Gather>
</Response>"##;

    // ===== focus and descent =====

    #[test]
    fn test_new_scope_focuses_root() {
        let s = scope(START);
        assert!(s.is_a(&ElementKind::Response));
        assert!(!s.is_a(&ElementKind::Gather));
    }

    #[test]
    fn test_within_moves_focus() {
        let s = scope(START);
        let gather = s.within(ElementKind::Gather).unwrap();
        assert!(gather.is_a(&ElementKind::Gather));
        assert_eq!(gather.focus_element().attribute("action"), Some("/twilio/test_action"));
    }

    #[test]
    fn test_within_missing_element_fails() {
        let s = scope("<Response><Say>Hi</Say></Response>");
        let err = s.within(ElementKind::Gather).unwrap_err();
        assert!(matches!(err, CallScopeError::NoElementInScope(ElementKind::Gather)));
    }

    #[test]
    fn test_nested_say_only_visible_inside_gather() {
        let s = scope(START);
        assert!(!s.has_say("Please enter some digits."));
        let gather = s.within(ElementKind::Gather).unwrap();
        assert!(gather.has_say("Please enter some digits."));
    }

    #[test]
    fn test_say_focus_sees_itself() {
        let say = scope("<Response><Say>Hello</Say></Response>")
            .within(ElementKind::Say)
            .unwrap();
        assert!(say.has_say("Hello"));
        assert!(!say.has_say("Goodbye"));
        assert!(!say.has_gather());
    }

    #[test]
    fn test_gather_focus_sees_itself_and_children() {
        let gather = scope(START).within(ElementKind::Gather).unwrap();
        assert!(gather.has_gather());
        assert!(gather.has_say("Please enter"));
        // 同じ gather に留まる
        let again = gather.within(ElementKind::Gather).unwrap();
        assert_eq!(again.focus(), gather.focus());
    }

    #[test]
    fn test_within_shares_document() {
        let s = scope(START);
        let gather = s.within(ElementKind::Gather).unwrap();
        assert!(std::ptr::eq(s.document(), gather.document()));
    }

    // ===== redirect =====

    #[test]
    fn test_redirect_target_and_method() {
        let s = scope(r#"<Response><Redirect method="GET"> /twilio/test_start </Redirect></Response>"#);
        let target = s.redirect().unwrap();
        assert_eq!(target.url, "/twilio/test_start");
        assert_eq!(target.method.as_deref(), Some("GET"));
    }

    #[test]
    fn test_has_redirect_to_normalizes() {
        let s = scope("<Response><Redirect>/twilio/test_start</Redirect></Response>");
        assert!(s.has_redirect());
        assert!(s.has_redirect_to("/twilio/test_start"));
        assert!(s.has_redirect_to("/twilio/test_start.xml"));
        assert!(!s.has_redirect_to("http://foo"));
    }

    #[test]
    fn test_has_redirect_to_normalizes_stored_side() {
        let s = scope("<Response><Redirect>/twilio/test_start.xml</Redirect></Response>");
        assert!(s.has_redirect_to("/twilio/test_start"));
    }

    #[test]
    fn test_has_redirect_to_with_query() {
        let s = scope("<Response><Redirect>/next?step=2.xml</Redirect></Response>");
        assert!(s.has_redirect_to("/next?step=2"));
        assert!(s.has_redirect_to("/next.xml?step=2"));
        assert!(!s.has_redirect_to("/next?step=3"));
    }

    #[test]
    fn test_empty_redirect_is_not_a_redirect() {
        let s = scope("<Response><Redirect/></Response>");
        assert!(!s.has_redirect());
        assert_eq!(s.redirect(), None);
    }

    #[test]
    fn test_no_redirect() {
        let s = scope("<Response><Say>This is a say page.</Say></Response>");
        assert!(!s.has_redirect());
        assert!(!s.has_redirect_to("/twilio/test_start"));
    }

    // ===== say / play / dial =====

    #[test]
    fn test_has_say_substring() {
        let s = scope("<Response><Say>This is a say page.</Say></Response>");
        assert!(s.has_say("This is a say page."));
        assert!(s.has_say("This is"));
        assert!(!s.has_say("Blah blah"));
    }

    #[test]
    fn test_has_play_substring_and_exact() {
        let s = scope("<Response><Play>/path/to/an/audio/clip.mp3</Play></Response>");
        assert!(s.has_play("/path/to/an/audio/clip.mp3"));
        assert!(s.has_play("clip.mp3"));
        assert!(!s.has_play("/path/to/a/different/audio/clip.mp3"));
        assert!(s.has_play_exact("/path/to/an/audio/clip.mp3"));
        assert!(!s.has_play_exact("clip.mp3"));
    }

    #[test]
    fn test_has_dial_with_action() {
        let s = scope(r#"<Response><Dial action="http://example.org:3000/call_me_back">18001234567</Dial></Response>"#);
        assert!(s.has_dial("18001234567"));
        assert!(s.has_dial("12345"));
        assert!(!s.has_dial("911"));
        assert!(s.has_action_on(ElementKind::Dial, "http://example.org:3000/call_me_back"));
        assert!(!s.has_action_on(ElementKind::Dial, "http://example.org:3000/dont_call"));
    }

    #[test]
    fn test_has_dial_number_noun() {
        let s = scope("<Response><Dial><Number>18001234567</Number></Dial></Response>");
        assert!(s.has_dial("18001234567"));
    }

    #[test]
    fn test_has_action_on_missing_attribute() {
        let s = scope("<Response><Dial>18001234567</Dial></Response>");
        assert!(!s.has_action_on(ElementKind::Dial, "http://example.org:3000/call_me_back"));
    }

    // ===== hangup / record =====

    #[test]
    fn test_has_hangup() {
        assert!(scope("<Response><Hangup/></Response>").has_hangup());
        assert!(!scope(START).has_hangup());
    }

    #[test]
    fn test_record_attributes() {
        let s = scope(r#"<Response><Record action="http://example.org:3000/record_this_call" maxLength="20" finishOnKey="*"/></Response>"#);
        assert!(s.has_record());
        assert!(s.has_action_on(ElementKind::Record, "http://example.org:3000/record_this_call"));
        assert!(s.has_max_length_on_record("20"));
        assert!(s.has_max_length_on_record(20));
        assert!(!s.has_max_length_on_record(30));
        assert!(s.has_finish_on_key_on_record("*"));
        assert!(!s.has_finish_on_key_on_record("#"));
    }

    // ===== sip =====

    const SIP: &str = r#"<Response><Dial><Sip username="foo" password="bar">sip:18885551234@sip.foo.bar</Sip></Dial></Response>"#;

    #[test]
    fn test_sip_inside_dial() {
        let s = scope(SIP);
        assert!(!s.has_sip());
        let dial = s.within(ElementKind::Dial).unwrap();
        assert!(dial.has_sip());
        assert!(dial.has_uri_on_sip("18885551234@sip.foo.bar"));
        assert!(dial.has_username_on_uri("foo"));
        assert!(dial.has_password_on_uri("bar"));
    }

    #[test]
    fn test_sip_focus_checks_itself() {
        let sip = scope(SIP)
            .within(ElementKind::Dial)
            .and_then(|dial| dial.within(ElementKind::Sip))
            .unwrap();
        assert!(sip.has_sip());
        assert!(sip.has_uri_on_sip("sip.foo.bar"));
        assert!(sip.has_username_on_uri("foo"));
        assert!(!sip.has_username_on_uri("bar"));
        assert!(!sip.has_password_on_uri("foo"));
    }

    #[test]
    fn test_sip_credentials_from_userinfo() {
        let dial = scope("<Response><Dial><Sip>sip:alice:secret@pbx.example.com</Sip></Dial></Response>")
            .within(ElementKind::Dial)
            .unwrap();
        assert!(dial.has_username_on_uri("alice"));
        assert!(dial.has_password_on_uri("secret"));
        assert!(!dial.has_password_on_uri("alice"));
    }

    #[test]
    fn test_generic_has_element_query() {
        let s = scope(START);
        let query = ElementQuery::new(ElementKind::Gather)
            .attribute("finishOnKey", AttributeMatch::Equals("#"))
            .attribute("action", AttributeMatch::SameUrl("/twilio/test_action.xml"));
        assert!(s.has_element(&query));
    }
}
