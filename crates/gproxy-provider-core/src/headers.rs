//! Ordered, case-insensitive header list shared by hooks and the transport
//! layer. A `Vec` rather than a map because hook chains append and must
//! preserve insertion order when an upstream is picky about header order.

pub type Headers = Vec<(String, String)>;

pub fn header_get<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub fn header_set(headers: &mut Headers, name: &str, value: impl Into<String>) {
    let value = value.into();
    if let Some(entry) = headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        entry.1 = value;
    } else {
        headers.push((name.to_string(), value));
    }
}

pub fn header_remove(headers: &mut Headers, name: &str) {
    headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_existing_case_insensitively() {
        let mut headers: Headers = vec![("Content-Type".to_string(), "text/plain".to_string())];
        header_set(&mut headers, "content-type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(header_get(&headers, "CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn remove_drops_matching_entries() {
        let mut headers: Headers = vec![
            ("Authorization".to_string(), "Bearer x".to_string()),
            ("X-Api-Key".to_string(), "y".to_string()),
        ];
        header_remove(&mut headers, "authorization");
        assert_eq!(headers.len(), 1);
        assert!(header_get(&headers, "Authorization").is_none());
    }
}
