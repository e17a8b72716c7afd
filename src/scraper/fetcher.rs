// HTTP implementation of the browser capability: replays the portal's
// server-side form postbacks with reqwest and reads pages with scraper.
use crate::config::PortalConfig;
use crate::model::BrowserError;
use crate::scraper::traits::{Browser, BrowserLauncher, RowHandle};
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub struct HttpBrowserLauncher {
    user_agent: String,
    request_timeout: Duration,
    postback_target_field: String,
}

impl HttpBrowserLauncher {
    pub fn new(portal: &PortalConfig) -> Self {
        Self {
            user_agent: portal.user_agent.clone(),
            request_timeout: portal.page_timeout(),
            postback_target_field: portal.postback_target_field.clone(),
        }
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for HttpBrowserLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>, BrowserError> {
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .cookie_store(true)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(Box::new(HttpBrowser {
            client,
            request_timeout: self.request_timeout,
            postback_target_field: self.postback_target_field.clone(),
            page: None,
            staged: HashMap::new(),
            reload_pending: false,
        }))
    }
}

struct LoadedPage {
    url: Url,
    html: String,
}

#[derive(Debug)]
enum PageRequest {
    Get(Url),
    Post { url: Url, fields: Vec<(String, String)> },
}

pub struct HttpBrowser {
    client: Client,
    request_timeout: Duration,
    postback_target_field: String,
    page: Option<LoadedPage>,
    /// Field values set by `fill`/`select_option`, sent with the next post.
    staged: HashMap<String, String>,
    /// A select changed without posting back; no reload will come.
    reload_pending: bool,
}

impl HttpBrowser {
    fn page(&self) -> Result<&LoadedPage, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::NoDocument)
    }

    fn document(&self) -> Result<Html, BrowserError> {
        Ok(Html::parse_document(&self.page()?.html))
    }

    fn resolve(&self, href: &str) -> Result<Url, BrowserError> {
        self.page()?
            .url
            .join(href)
            .map_err(|e| BrowserError::HttpError(format!("bad url '{}': {}", href, e)))
    }

    /// Name of the form field behind `selector`.
    fn field_name(&self, selector: &str) -> Result<String, BrowserError> {
        let doc = self.document()?;
        let element = find(&doc, selector)?;
        element
            .value()
            .attr("name")
            .map(str::to_string)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{} (no name)", selector)))
    }

    fn plan_postback(
        &self,
        doc: &Html,
        element: ElementRef<'_>,
        selector: &str,
        extra: Vec<(String, String)>,
    ) -> Result<PageRequest, BrowserError> {
        let form = enclosing_form(doc, element)?
            .ok_or_else(|| BrowserError::NoForm(selector.to_string()))?;
        let url = match form.value().attr("action") {
            Some(action) if !action.trim().is_empty() => self.resolve(action)?,
            _ => self.page()?.url.clone(),
        };

        let mut fields = collect_form_fields(form)?;
        for (name, value) in self.staged.iter().map(|(k, v)| (k.clone(), v.clone())).chain(extra) {
            match fields.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = value,
                None => fields.push((name, value)),
            }
        }
        Ok(PageRequest::Post { url, fields })
    }

    fn plan_click(&self, selector: &str) -> Result<PageRequest, BrowserError> {
        let doc = self.document()?;
        let element = find(&doc, selector)?;
        let node = element.value();
        let kind = node.attr("type").unwrap_or("").to_ascii_lowercase();
        let is_submit = match node.name() {
            "input" => kind == "submit" || kind == "image",
            "button" => kind != "button" && kind != "reset",
            _ => false,
        };

        if is_submit {
            let mut extra = Vec::new();
            if let Some(name) = node.attr("name") {
                extra.push((name.to_string(), node.attr("value").unwrap_or("").to_string()));
            }
            return self.plan_postback(&doc, element, selector, extra);
        }

        if node.name() == "a" {
            if let Some(href) = node.attr("href").map(str::trim) {
                let scripted =
                    href.is_empty() || href.starts_with('#') || href.starts_with("javascript:");
                if !scripted {
                    return Ok(PageRequest::Get(self.resolve(href)?));
                }
            }
        }

        let target = node
            .id()
            .and_then(|id| registered_event_target(&doc, id))
            .or_else(|| node.attr("name").map(str::to_string))
            .or_else(|| node.id().map(str::to_string))
            .ok_or_else(|| {
                BrowserError::ElementNotFound(format!("{} (no postback target)", selector))
            })?;
        let extra = vec![(self.postback_target_field.clone(), target)];
        self.plan_postback(&doc, element, selector, extra)
    }

    /// Returns the field to stage and, when the select posts back on change,
    /// the request to send.
    fn plan_select(
        &self,
        selector: &str,
        value: &str,
    ) -> Result<(String, Option<PageRequest>), BrowserError> {
        let doc = self.document()?;
        let element = find(&doc, selector)?;
        let name = element
            .value()
            .attr("name")
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{} (no name)", selector)))?
            .to_string();

        let options = parse_selector("option")?;
        let available = element
            .select(&options)
            .any(|o| option_value(o) == value);
        if !available {
            return Err(BrowserError::OptionNotFound {
                selector: selector.to_string(),
                value: value.to_string(),
            });
        }

        let auto_target = element
            .value()
            .id()
            .and_then(|id| registered_event_target(&doc, id))
            .or_else(|| element.value().attr("onchange").map(|_| name.clone()));

        let request = match auto_target {
            Some(target) => {
                let extra = vec![
                    (name.clone(), value.to_string()),
                    (self.postback_target_field.clone(), target),
                ];
                Some(self.plan_postback(&doc, element, selector, extra)?)
            }
            None => None,
        };
        Ok((name, request))
    }

    async fn execute(
        &mut self,
        request: PageRequest,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let (builder, target) = match request {
            PageRequest::Get(url) => (self.client.get(url.clone()), url),
            PageRequest::Post { url, fields } => (self.client.post(url.clone()).form(&fields), url),
        };
        debug!("➡️ Requesting {}", target);

        let response = builder.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                BrowserError::Timeout { what: target.to_string(), after: timeout }
            } else {
                BrowserError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrowserError::HttpError(format!("{} answered {}", target, status)));
        }

        let url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| BrowserError::HttpError(e.to_string()))?;
        self.page = Some(LoadedPage { url, html });
        self.staged.clear();
        self.reload_pending = false;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Browser for HttpBrowser {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let url = Url::parse(url)
            .map_err(|e| BrowserError::HttpError(format!("bad url '{}': {}", url, e)))?;
        self.execute(PageRequest::Get(url), timeout).await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let name = self.field_name(selector)?;
        self.staged.insert(name, value.to_string());
        Ok(())
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let (name, request) = self.plan_select(selector, value)?;
        self.staged.insert(name, value.to_string());
        match request {
            Some(request) => self.execute(request, self.request_timeout).await,
            None => {
                self.reload_pending = true;
                Ok(())
            }
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let request = self.plan_click(selector)?;
        self.execute(request, self.request_timeout).await
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        // Pages are complete once the response is read; nothing appears later.
        let doc = self.document()?;
        let sel = parse_selector(selector)?;
        if doc.select(&sel).next().is_some() {
            Ok(())
        } else {
            Err(BrowserError::Timeout { what: selector.to_string(), after: timeout })
        }
    }

    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        self.page()?;
        if self.reload_pending {
            return Err(BrowserError::Timeout {
                what: "page reload (value staged, nothing posted)".to_string(),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let doc = self.document()?;
        let sel = parse_selector(selector)?;
        Ok(doc.select(&sel).next().map(element_text))
    }

    async fn rows(&self, selector: &str) -> Result<Vec<Box<dyn RowHandle>>, BrowserError> {
        let doc = self.document()?;
        let sel = parse_selector(selector)?;
        Ok(doc
            .select(&sel)
            .map(|row| Box::new(HtmlRow::new(row.html())) as Box<dyn RowHandle>)
            .collect())
    }
}

/// Snapshot of a result row's markup.
pub struct HtmlRow {
    html: String,
}

impl HtmlRow {
    pub fn new(html: String) -> Self {
        Self { html }
    }

    fn with_root<T>(
        &self,
        f: impl FnOnce(ElementRef<'_>) -> Result<T, BrowserError>,
    ) -> Result<T, BrowserError> {
        // A bare <tr> is dropped by the HTML parser outside of a table.
        let wrapped = if self.html.trim_start().starts_with("<tr") {
            format!("<table><tbody>{}</tbody></table>", self.html)
        } else {
            self.html.clone()
        };
        let fragment = Html::parse_fragment(&wrapped);
        let root = fragment
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .flat_map(|e| std::iter::once(e).chain(e.descendants().filter_map(ElementRef::wrap)))
            .find(|e| !matches!(e.value().name(), "table" | "tbody"))
            .ok_or_else(|| BrowserError::ElementNotFound("row root".into()))?;
        f(root)
    }
}

#[async_trait::async_trait]
impl RowHandle for HtmlRow {
    async fn inner_text(&self) -> Result<String, BrowserError> {
        self.with_root(|row| Ok(element_text(row)))
    }

    async fn is_visible(&self) -> Result<bool, BrowserError> {
        self.with_root(|row| {
            let node = row.value();
            let style = node.attr("style").unwrap_or("").replace(' ', "").to_ascii_lowercase();
            Ok(node.attr("hidden").is_none() && !style.contains("display:none"))
        })
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let sel = parse_selector(selector)?;
        self.with_root(|row| Ok(row.select(&sel).next().map(element_text)))
    }

    async fn attr_of(&self, selector: &str, attr: &str) -> Result<Option<String>, BrowserError> {
        let sel = parse_selector(selector)?;
        self.with_root(|row| {
            Ok(row
                .select(&sel)
                .next()
                .and_then(|e| e.value().attr(attr))
                .map(str::to_string))
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector)
        .map_err(|e| BrowserError::InvalidSelector(format!("{}: {}", selector, e)))
}

fn find<'a>(doc: &'a Html, selector: &str) -> Result<ElementRef<'a>, BrowserError> {
    let sel = parse_selector(selector)?;
    doc.select(&sel)
        .next()
        .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
}

/// Rendered text with one line per text node, like a browser's innerText.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn option_value(option: ElementRef<'_>) -> String {
    option
        .value()
        .attr("value")
        .map(str::to_string)
        .unwrap_or_else(|| element_text(option))
}

fn enclosing_form<'a>(
    doc: &'a Html,
    element: ElementRef<'a>,
) -> Result<Option<ElementRef<'a>>, BrowserError> {
    let own = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "form");
    if own.is_some() {
        return Ok(own);
    }
    let forms = parse_selector("form")?;
    Ok(doc.select(&forms).next())
}

/// Successful controls of a form, as the browser would submit them.
pub fn collect_form_fields(form: ElementRef<'_>) -> Result<Vec<(String, String)>, BrowserError> {
    let controls = parse_selector("input, select, textarea")?;
    let options = parse_selector("option")?;
    let selected = parse_selector("option[selected]")?;
    let mut fields = Vec::new();

    for control in form.select(&controls) {
        let node = control.value();
        let Some(name) = node.attr("name") else { continue };
        if node.attr("disabled").is_some() {
            continue;
        }

        let value = match node.name() {
            "input" => {
                let kind = node.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "image" | "reset" | "file" => continue,
                    "checkbox" | "radio" => {
                        if node.attr("checked").is_none() {
                            continue;
                        }
                        node.attr("value").unwrap_or("on").to_string()
                    }
                    _ => node.attr("value").unwrap_or("").to_string(),
                }
            }
            "select" => match control.select(&selected).next().or_else(|| control.select(&options).next()) {
                Some(option) => option_value(option),
                None => continue,
            },
            _ => control.text().collect::<String>(),
        };
        fields.push((name.to_string(), value));
    }
    Ok(fields)
}

/// Event target a page script registered for the control with `id`.
/// Only the registration object holding the id is searched.
pub fn registered_event_target(doc: &Html, id: &str) -> Option<String> {
    let scripts = Selector::parse("script").ok()?;
    let needles = [format!("'{}'", id), format!("\"{}\"", id)];
    for script in doc.select(&scripts) {
        let body: String = script.text().collect();
        for (pos, _) in needles.iter().flat_map(|n| body.match_indices(n.as_str())) {
            let Some(object) = registration_object(&body, pos) else { continue };
            if !declares_id(object, id) {
                continue;
            }
            return quoted_value_after(object, "EventTarget");
        }
    }
    None
}

/// The innermost `{...}` literal around byte offset `pos`.
fn registration_object(body: &str, pos: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in body[..pos].char_indices().rev() {
        match c {
            '}' => depth += 1,
            '{' if depth == 0 => {
                start = Some(i);
                break;
            }
            '{' => depth -= 1,
            _ => {}
        }
    }
    let start = start?;

    let mut depth = 0usize;
    for (i, c) in body[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn declares_id(object: &str, id: &str) -> bool {
    quoted_value_after(object, "ID").is_some_and(|v| v == id)
}

/// Value of `'key': '...'` (either quote style) inside a script object.
fn quoted_value_after(object: &str, key: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        let pattern = format!("{q}{key}{q}", q = quote);
        let Some(at) = object.find(&pattern) else { continue };
        let after = object[at + pattern.len()..].trim_start().strip_prefix(':')?.trim_start();
        let open = after.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let value = &after[1..];
        return value.find(open).map(|end| value[..end].to_string());
    }
    None
}
