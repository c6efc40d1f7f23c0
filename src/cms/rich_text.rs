//! Structured text → HTML.
//!
//! The CMS stores body copy as a flat list of blocks, each with plain text
//! and a list of inline spans (character ranges tagged `strong`, `em`,
//! `hyperlink`, ...). [`as_html`] turns such a list into markup:
//!
//! ```text
//! paragraph            → <p>
//! heading1..heading6   → <h1>..<h6>
//! preformatted         → <pre>
//! list-item (run)      → <ul><li>..</li></ul>
//! o-list-item (run)    → <ol><li>..</li></ol>
//! image                → <p class="block-img"><img></p>
//! embed                → <div data-oembed=..>{provider html}</div>
//! ```
//!
//! Text is escaped by maud. Overlapping spans are handled by cutting the text
//! at every span boundary and wrapping each piece in the spans that cover it,
//! so `<strong>a<em>b</em></strong>` may come out as
//! `<strong>a</strong><strong><em>b</em></strong>`; browsers render both the
//! same. Unknown block types are skipped.
//!
//! Span offsets count UTF-16 code units, the way the CMS editor measures
//! text. They only differ from character offsets once a character outside the
//! Basic Multilingual Plane (an emoji, say) precedes the span.

use crate::types::{RichTextBlock, Span};
use maud::{Markup, PreEscaped, html};

/// Serialize a block list to an HTML fragment.
pub fn as_html(blocks: &[RichTextBlock]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < blocks.len() {
        let kind = blocks[i].kind.as_str();
        if kind == "list-item" || kind == "o-list-item" {
            let start = i;
            while i < blocks.len() && blocks[i].kind == kind {
                i += 1;
            }
            out.push_str(&render_list(kind, &blocks[start..i]).into_string());
        } else {
            out.push_str(&render_block(&blocks[i]).into_string());
            i += 1;
        }
    }
    out
}

/// Plain text of a block list, one line per block.
pub fn as_text(blocks: &[RichTextBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_list(kind: &str, items: &[RichTextBlock]) -> Markup {
    let lis = html! {
        @for item in items {
            li { (inline(item)) }
        }
    };
    if kind == "o-list-item" {
        html! { ol { (lis) } }
    } else {
        html! { ul { (lis) } }
    }
}

fn render_block(block: &RichTextBlock) -> Markup {
    match block.kind.as_str() {
        "paragraph" => html! { p { (inline(block)) } },
        "heading1" => html! { h1 { (inline(block)) } },
        "heading2" => html! { h2 { (inline(block)) } },
        "heading3" => html! { h3 { (inline(block)) } },
        "heading4" => html! { h4 { (inline(block)) } },
        "heading5" => html! { h5 { (inline(block)) } },
        "heading6" => html! { h6 { (inline(block)) } },
        "preformatted" => html! { pre { (inline(block)) } },
        "image" => match &block.url {
            Some(url) => html! {
                p.block-img {
                    img src=(url) alt=(block.alt.as_deref().unwrap_or_default());
                }
            },
            None => html! {},
        },
        "embed" => match block.oembed.as_ref().and_then(|e| e.html.as_deref()) {
            // Provider markup (iframes) is trusted the same way the CMS trusts it.
            Some(embed_html) => html! {
                div data-oembed=[block.oembed.as_ref().and_then(|e| e.embed_url.as_deref())] {
                    (PreEscaped(embed_html))
                }
            },
            None => html! {},
        },
        _ => html! {},
    }
}

/// Render a block's text with its inline spans applied.
fn inline(block: &RichTextBlock) -> Markup {
    let text: Vec<u16> = block
        .text
        .as_deref()
        .unwrap_or_default()
        .encode_utf16()
        .collect();
    let len = text.len();

    let spans: Vec<&Span> = block
        .spans
        .iter()
        .filter(|s| s.start < s.end && s.start < len)
        .collect();

    let mut cuts: Vec<usize> = vec![0, len];
    for span in &spans {
        cuts.push(span.start);
        cuts.push(span.end.min(len));
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut out = String::new();
    for pair in cuts.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let segment = String::from_utf16_lossy(&text[from..to]);
        let mut markup = text_with_breaks(&segment);

        // Outermost span first in document order: longest span starting earliest.
        let mut covering: Vec<&Span> = spans
            .iter()
            .copied()
            .filter(|s| s.start <= from && s.end.min(len) >= to)
            .collect();
        covering.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        for span in covering.iter().rev() {
            markup = wrap_span(span, markup);
        }
        out.push_str(&markup.into_string());
    }
    PreEscaped(out)
}

fn text_with_breaks(text: &str) -> Markup {
    html! {
        @for (n, line) in text.split('\n').enumerate() {
            @if n > 0 { br; }
            (line)
        }
    }
}

fn wrap_span(span: &Span, inner: Markup) -> Markup {
    match span.kind.as_str() {
        "strong" => html! { strong { (inner) } },
        "em" => html! { em { (inner) } },
        "hyperlink" => {
            let data = span.data.as_ref();
            let url = data
                .and_then(|d| d.url.as_deref())
                .filter(|u| is_safe_link(u))
                .unwrap_or("#");
            let blank = data.and_then(|d| d.target.as_deref()) == Some("_blank");
            html! {
                a href=(url) target=[blank.then_some("_blank")] rel=[blank.then_some("noopener")] {
                    (inner)
                }
            }
        }
        "label" => {
            let class = span.data.as_ref().and_then(|d| d.label.as_deref());
            html! { span class=[class] { (inner) } }
        }
        _ => inner,
    }
}

fn is_safe_link(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    !(lower.starts_with("javascript:") || lower.starts_with("data:") || lower.starts_with("vbscript:"))
}
