// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Feed rendering
//!
//! RSS 2.0, Atom and OPML documents come from Handlebars templates; the
//! default `{{ }}` escaping covers every character XML reserves. JSON Feed
//! goes through serde. Item descriptions are small HTML fragments, rendered
//! the same way and then escaped again as XML text.

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Feed, FeedItem};
use crate::domain::integration::IntegrationError;

pub const SACRED_NAMESPACE: &str = "http://theweave.dev/sacred";
pub const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1";

const RSS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:sacred="{{namespace}}" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{{title}}</title>
    <description>{{description}}</description>
    <link>{{base_url}}</link>
    <atom:link href="{{self_link}}" rel="self" type="application/rss+xml"/>
    <lastBuildDate>{{build_date}}</lastBuildDate>
    <generator>The Weave RSS Generator</generator>
    <docs>https://www.rssboard.org/rss-specification</docs>
    <ttl>60</ttl>
    {{#each items}}
    <item>
      <title>{{title}}</title>
      <description>{{description}}</description>
      <link>{{link}}</link>
      <guid isPermaLink="false">{{guid}}</guid>
      <pubDate>{{pub_date}}</pubDate>
      <category>{{category}}</category>
      {{#each sacred}}
      <sacred:{{@key}}>{{this}}</sacred:{{@key}}>
      {{/each}}
    </item>
    {{/each}}
  </channel>
</rss>
"#;

const ATOM_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:sacred="{{namespace}}">
  <title>{{title}}</title>
  <subtitle>{{description}}</subtitle>
  <link href="{{self_link}}" rel="self"/>
  <link href="{{base_url}}" rel="alternate"/>
  <updated>{{updated}}</updated>
  <id>{{self_link}}</id>
  {{#each items}}
  <entry>
    <title>{{title}}</title>
    <link href="{{link}}"/>
    <id>urn:the-weave:{{guid}}</id>
    <updated>{{updated}}</updated>
    <summary type="html">{{description}}</summary>
    <category term="{{category}}"/>
  </entry>
  {{/each}}
</feed>
"#;

const OPML_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="1.0">
  <head>
    <title>The Weave Sacred Feeds</title>
    <dateCreated>{{date_created}}</dateCreated>
  </head>
  <body>
    {{#each outlines}}
    <outline text="{{title}}" title="{{title}}" type="rss" xmlUrl="{{xml_url}}" htmlUrl="{{html_url}}"/>
    {{/each}}
  </body>
</opml>
"#;

pub const EVENT_DESCRIPTION: &str = r#"<div style="font-family: Georgia, serif; padding: 15px;">
  <p>{{narrative}}</p>
  {{#if details}}<p>{{details}}</p>{{/if}}
  <p style="color: #666; margin-top: 15px;">Time: {{time}}<br>Field Coherence: {{coherence}}%</p>
</div>"#;

pub const CEREMONY_DESCRIPTION: &str = r#"<div style="font-family: Georgia, serif; padding: 20px;">
  <h3>{{ceremony_type}} Ceremony - {{status}}</h3>
  <p>{{narrative}}</p>
  {{#if participants}}<p><strong>Participants:</strong> {{participants}}</p>{{/if}}
  {{#if coherence_change}}<p><strong>Coherence change:</strong> {{coherence_change}}%</p>{{/if}}
  {{#if outcomes}}<h4>Outcomes:</h4>
  <ul>{{#each outcomes}}<li>{{@key}}: {{this}}</li>{{/each}}</ul>{{/if}}
</div>"#;

pub const ORACLE_DESCRIPTION: &str = r#"<div style="font-family: Georgia, serif; padding: 20px;">
  <h3>Question:</h3>
  <p style="font-style: italic;">{{question}}</p>
  <h3>The Oracle Speaks:</h3>
  <p>{{response}}</p>
  <p style="color: #666; margin-top: 20px;">Field Coherence: {{coherence}}%<br>Seeker: {{seeker}}</p>
</div>"#;

pub const COHERENCE_DESCRIPTION: &str = r#"<div style="font-family: Georgia, serif; padding: 20px;">
  <h3>Field Coherence Update</h3>
  <p>{{narrative}}</p>
  <p><strong>Trigger:</strong> {{trigger}}</p>
  {{#if harmonies}}<h4>Harmony Levels:</h4>
  <ul>{{#each harmonies}}<li>{{@key}}: {{this}}%</li>{{/each}}</ul>{{/if}}
</div>"#;

#[derive(Serialize)]
struct ChannelView<'a> {
    namespace: &'static str,
    title: &'a str,
    description: &'a str,
    base_url: &'a str,
    self_link: String,
    build_date: String,
    updated: String,
    items: Vec<ItemView<'a>>,
}

#[derive(Serialize)]
struct ItemView<'a> {
    title: &'a str,
    description: &'a str,
    link: &'a str,
    guid: &'a str,
    pub_date: String,
    updated: String,
    category: &'a str,
    sacred: BTreeMap<String, &'a serde_json::Value>,
}

#[derive(Serialize)]
struct OutlineView {
    title: String,
    xml_url: String,
    html_url: String,
}

/// JSON Feed v1 document. `_sacred` carries every item field the other
/// formats need so the feed can be reloaded from this file alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFeed {
    pub version: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub home_page_url: String,
    #[serde(default)]
    pub feed_url: String,
    #[serde(default)]
    pub items: Vec<JsonFeedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFeedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content_html: String,
    pub date_published: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "_sacred", default)]
    pub sacred: BTreeMap<String, serde_json::Value>,
}

impl From<&FeedItem> for JsonFeedItem {
    fn from(item: &FeedItem) -> Self {
        Self {
            id: item.guid.clone(),
            url: item.link.clone(),
            title: item.title.clone(),
            content_html: item.description.clone(),
            date_published: item.pub_date,
            tags: vec![item.category.clone()],
            sacred: item.sacred.clone(),
        }
    }
}

impl From<JsonFeedItem> for FeedItem {
    fn from(item: JsonFeedItem) -> Self {
        Self {
            guid: item.id,
            title: item.title,
            description: item.content_html,
            link: item.url,
            pub_date: item.date_published,
            category: item.tags.into_iter().next().unwrap_or_else(|| "event".to_string()),
            sacred: item.sacred,
        }
    }
}

pub struct FeedRenderer {
    handlebars: Handlebars<'static>,
    base_url: String,
}

impl FeedRenderer {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        Self {
            handlebars,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn feed_url(&self, name: &str, extension: &str) -> String {
        format!("{}/feeds/{}.{}", self.base_url, name, extension)
    }

    /// Render an HTML fragment for an item description.
    pub fn fragment<T: Serialize>(&self, template: &str, context: &T) -> Result<String, IntegrationError> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| IntegrationError::Template(e.to_string()))
    }

    fn channel<'a>(&'a self, name: &str, feed: &'a Feed) -> ChannelView<'a> {
        let now = Utc::now();
        ChannelView {
            namespace: SACRED_NAMESPACE,
            title: &feed.title,
            description: &feed.description,
            base_url: &self.base_url,
            self_link: self.feed_url(name, "xml"),
            build_date: now.to_rfc2822(),
            updated: now.to_rfc3339(),
            items: feed
                .items
                .iter()
                .map(|item| ItemView {
                    title: &item.title,
                    description: &item.description,
                    link: &item.link,
                    guid: &item.guid,
                    pub_date: item.pub_date.to_rfc2822(),
                    updated: item.pub_date.to_rfc3339(),
                    category: &item.category,
                    sacred: item
                        .sacred
                        .iter()
                        .map(|(key, value)| (xml_name(key), value))
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn rss(&self, name: &str, feed: &Feed) -> Result<String, IntegrationError> {
        self.fragment(RSS_TEMPLATE, &self.channel(name, feed))
    }

    pub fn atom(&self, name: &str, feed: &Feed) -> Result<String, IntegrationError> {
        self.fragment(ATOM_TEMPLATE, &self.channel(name, feed))
    }

    pub fn json(&self, name: &str, feed: &Feed) -> Result<String, IntegrationError> {
        let document = JsonFeed {
            version: JSON_FEED_VERSION.to_string(),
            title: feed.title.clone(),
            description: feed.description.clone(),
            home_page_url: self.base_url.clone(),
            feed_url: self.feed_url(name, "json"),
            items: feed.items.iter().map(JsonFeedItem::from).collect(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub fn opml<'a>(&self, feeds: impl Iterator<Item = (&'a String, &'a Feed)>) -> Result<String, IntegrationError> {
        let outlines: Vec<OutlineView> = feeds
            .map(|(name, feed)| OutlineView {
                title: feed.title.clone(),
                xml_url: self.feed_url(name, "xml"),
                html_url: self.base_url.clone(),
            })
            .collect();

        self.fragment(
            OPML_TEMPLATE,
            &serde_json::json!({
                "date_created": Utc::now().to_rfc2822(),
                "outlines": outlines,
            }),
        )
    }
}

/// Extension element names: ASCII alphanumerics, `-` and `_` only, never
/// starting with a digit.
fn xml_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        name.insert(0, '_');
    }
    name
}
