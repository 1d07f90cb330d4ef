//! Consent page rendering.

use std::collections::BTreeMap;

/// Languages offered in the language switch.
pub const LANGUAGES: &[&str] = &["en", "nl"];

/// Strings shown on the consent page.
struct Messages {
    title: &'static str,
    intro: &'static str,
    released: &'static str,
    privacy: &'static str,
    accept: &'static str,
    deny: &'static str,
}

const EN: Messages = Messages {
    title: "Consent",
    intro: "requests the following information about you:",
    released: "Information to be released",
    privacy: "Privacy and data protection",
    accept: "Yes, continue",
    deny: "No, cancel",
};

const NL: Messages = Messages {
    title: "Toestemming",
    intro: "vraagt de volgende gegevens over u:",
    released: "Gegevens die worden vrijgegeven",
    privacy: "Privacy en gegevensbescherming",
    accept: "Ja, doorgaan",
    deny: "Nee, annuleren",
};

fn messages(language: &str) -> &'static Messages {
    match language {
        "nl" => &NL,
        _ => &EN,
    }
}

/// Everything the consent page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext<'a> {
    pub requester_name: &'a str,
    pub requester_logo: Option<&'a str>,
    pub privacy_url: &'a str,
    /// Label → values to be released.
    pub released_claims: &'a BTreeMap<String, Vec<String>>,
    /// Consent handler URL; `/allow` and `/deny` are appended for the actions.
    pub form_action: &'a str,
    pub language: &'a str,
}

/// Render the consent page. Pure: the same context always yields the same page.
pub fn render_page(ctx: &PageContext<'_>) -> String {
    let msg = messages(ctx.language);
    let lang = escape_html(ctx.language);
    let name = escape_html(ctx.requester_name);
    let action = escape_html(ctx.form_action);

    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n");
    page.push_str(&format!("<html lang=\"{}\">\n<head>\n", lang));
    page.push_str("<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", msg.title));

    page.push_str("<nav class=\"languages\">");
    for code in LANGUAGES {
        page.push_str(&format!(
            "<a href=\"{}?lang={}\">{}</a> ",
            action,
            urlencoding::encode(code),
            code
        ));
    }
    page.push_str("</nav>\n");

    if let Some(logo) = ctx.requester_logo {
        page.push_str(&format!(
            "<img class=\"requester-logo\" src=\"{}\" alt=\"{}\">\n",
            escape_html(logo),
            name
        ));
    }

    page.push_str(&format!("<h1>{}</h1>\n", msg.title));
    page.push_str(&format!("<p><strong>{}</strong> {}</p>\n", name, msg.intro));

    page.push_str(&format!("<h2>{}</h2>\n<dl class=\"claims\">\n", msg.released));
    for (label, values) in ctx.released_claims {
        page.push_str(&format!("<dt>{}</dt>\n", escape_html(label)));
        for value in values {
            page.push_str(&format!("<dd>{}</dd>\n", escape_html(value)));
        }
    }
    page.push_str("</dl>\n");

    for (suffix, label) in [("allow", msg.accept), ("deny", msg.deny)] {
        page.push_str(&format!(
            "<form method=\"post\" action=\"{}/{}\"><input type=\"hidden\" name=\"lang\" value=\"{}\"><button type=\"submit\">{}</button></form>\n",
            action, suffix, lang, label
        ));
    }

    page.push_str(&format!(
        "<p><a href=\"{}\">{}</a></p>\n</body>\n</html>\n",
        escape_html(ctx.privacy_url),
        msg.privacy
    ));
    page
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> BTreeMap<String, Vec<String>> {
        let mut claims = BTreeMap::new();
        claims.insert("Affiliation".to_string(), vec!["member".to_string(), "student".to_string()]);
        claims
    }

    fn context<'a>(claims: &'a BTreeMap<String, Vec<String>>, language: &'a str) -> PageContext<'a> {
        PageContext {
            requester_name: "Example <RP>",
            requester_logo: Some("https://rp.example.org/logo.png"),
            privacy_url: "https://example.org/privacy",
            released_claims: claims,
            form_action: "/consent/handle_consent",
            language,
        }
    }

    #[test]
    fn test_render_contents() {
        let claims = claims();
        let page = render_page(&context(&claims, "en"));

        assert!(page.contains("<html lang=\"en\">"));
        assert!(page.contains("Example &lt;RP&gt;"));
        assert!(!page.contains("Example <RP>"));
        assert!(page.contains("<dt>Affiliation</dt>"));
        assert!(page.contains("<dd>student</dd>"));
        assert!(page.contains("action=\"/consent/handle_consent/allow\""));
        assert!(page.contains("action=\"/consent/handle_consent/deny\""));
        assert!(page.contains("href=\"/consent/handle_consent?lang=nl\""));
        assert!(page.contains("src=\"https://rp.example.org/logo.png\""));
        assert!(page.contains("Yes, continue"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let claims = claims();
        assert_eq!(render_page(&context(&claims, "en")), render_page(&context(&claims, "en")));
    }

    #[test]
    fn test_language_selection() {
        let claims = claims();
        let nl = render_page(&context(&claims, "nl"));
        assert!(nl.contains("Ja, doorgaan"));

        // unknown language keeps the lang tag but shows English text
        let fr = render_page(&context(&claims, "fr"));
        assert!(fr.contains("<html lang=\"fr\">"));
        assert!(fr.contains("Yes, continue"));
    }

    #[test]
    fn test_no_logo() {
        let claims = claims();
        let mut ctx = context(&claims, "en");
        ctx.requester_logo = None;
        assert!(!render_page(&ctx).contains("<img"));
    }
}
