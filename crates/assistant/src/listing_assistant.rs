//! Rule-based generator that answers from the listing catalog.

use std::cmp::Ordering;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use realty_config::AssistantConfig;
use regex::Regex;
use tracing::debug;

use crate::{group_thousands, AssistantError, AssistantResult, ListingSummary, Prompt, Reply, ReplyGenerator};

static GREETING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(hi|hello|hey|hiya|howdy|good (morning|afternoon|evening))\b").expect("invalid greeting pattern")
});

static HANDOFF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(agent|human|real person|someone|call me|phone me|speak (to|with)|talk (to|with)|viewing|visit|tour|appointment|schedule|book)\b",
    )
    .expect("invalid handoff pattern")
});

static BUDGET_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(under|below|less than|max(imum)?|up to|budget( of| is)?)\s*[$€£]?\s*(\d[\d,.]*)\s*(k|m|mil|million|thousand)?\b",
    )
    .expect("invalid budget pattern")
});

static BUDGET_SYMBOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$€£]\s*(\d[\d,.]*)\s*(k|m|mil|million|thousand)?\b").expect("invalid price pattern")
});

static BEDROOMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+|one|two|three|four|five|six)\s*\+?\s*-?\s*(bed|beds|bedroom|bedrooms|br|bd)\b")
        .expect("invalid bedroom pattern")
});

static RENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(rent|rental|renting|lease|leasing)\b").expect("invalid rent pattern"));

static BUY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(buy|buying|purchase|for sale)\b").expect("invalid buy pattern"));

const PROPERTY_TYPE_WORDS: &[(&str, &str)] = &[
    ("house", "house"),
    ("houses", "house"),
    ("villa", "house"),
    ("apartment", "apartment"),
    ("apartments", "apartment"),
    ("flat", "apartment"),
    ("flats", "apartment"),
    ("condo", "condo"),
    ("condos", "condo"),
    ("townhouse", "townhouse"),
    ("townhouses", "townhouse"),
    ("land", "land"),
    ("plot", "land"),
    ("commercial", "commercial"),
    ("office", "commercial"),
    ("shop", "commercial"),
];

/// What the lead asked for in their latest message.
#[derive(Debug, Default, Clone, PartialEq)]
struct Intent {
    greeting: bool,
    handoff: bool,
    max_price: Option<i64>,
    min_bedrooms: Option<i64>,
    city: Option<String>,
    listing_type: Option<&'static str>,
    property_type: Option<&'static str>,
}

impl Intent {
    fn parse(text: &str, listings: &[ListingSummary]) -> Self {
        let text = text.to_lowercase();

        let listing_type = if RENT.is_match(&text) {
            Some("rent")
        } else if BUY.is_match(&text) {
            Some("sale")
        } else {
            None
        };

        let property_type = text
            .split(|c: char| !c.is_alphanumeric())
            .find_map(|word| {
                PROPERTY_TYPE_WORDS
                    .iter()
                    .find(|(alias, _)| *alias == word)
                    .map(|(_, kind)| *kind)
            });

        let city = listings
            .iter()
            .map(|listing| listing.city.as_str())
            .filter(|city| !city.is_empty())
            .find(|city| text.contains(&city.to_lowercase()))
            .map(str::to_string);

        Self {
            greeting: GREETING.is_match(&text),
            handoff: HANDOFF.is_match(&text),
            max_price: parse_budget(&text),
            min_bedrooms: parse_bedrooms(&text),
            city,
            listing_type,
            property_type,
        }
    }

    fn has_criteria(&self) -> bool {
        self.max_price.is_some()
            || self.min_bedrooms.is_some()
            || self.city.is_some()
            || self.listing_type.is_some()
            || self.property_type.is_some()
    }

    fn matches(&self, listing: &ListingSummary) -> bool {
        self.max_price.map_or(true, |max| listing.price <= max)
            && self.min_bedrooms.map_or(true, |min| listing.bedrooms >= min)
            && self
                .city
                .as_ref()
                .map_or(true, |city| listing.city.eq_ignore_ascii_case(city))
            && self.listing_type.map_or(true, |kind| listing.listing_type == kind)
            && self.property_type.map_or(true, |kind| listing.property_type == kind)
    }
}

fn parse_amount(number: &str, suffix: Option<&str>) -> Option<i64> {
    let cleaned: String = number
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    let multiplier = match suffix {
        Some("k" | "thousand") => 1_000.0,
        Some("m" | "mil" | "million") => 1_000_000.0,
        _ => 1.0,
    };
    Some((value * multiplier).round() as i64)
}

fn parse_budget(text: &str) -> Option<i64> {
    if let Some(caps) = BUDGET_KEYWORD.captures(text) {
        return parse_amount(caps.get(4)?.as_str(), caps.get(5).map(|m| m.as_str()));
    }
    let caps = BUDGET_SYMBOL.captures(text)?;
    parse_amount(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))
}

fn parse_bedrooms(text: &str) -> Option<i64> {
    let caps = BEDROOMS.captures(text)?;
    match caps.get(1)?.as_str() {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        digits => digits.parse().ok(),
    }
}

fn price_label(listing: &ListingSummary) -> String {
    let period = if listing.is_rental() { "/month" } else { "" };
    format!("{} {}{}", listing.currency, group_thousands(listing.price), period)
}

/// Featured first, then cheapest.
fn rank(a: &ListingSummary, b: &ListingSummary) -> Ordering {
    b.featured.cmp(&a.featured).then(a.price.cmp(&b.price))
}

#[derive(Debug, Clone)]
pub struct ListingAssistant {
    handoff_message: String,
    max_listings: usize,
}

impl ListingAssistant {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            handoff_message: config.handoff_message.clone(),
            max_listings: config.max_listings_in_reply.max(1),
        }
    }

    fn listing_reply(&self, intro: &str, listings: Vec<&ListingSummary>, outro: &str) -> Reply {
        let mut content = intro.to_string();
        let mut listing_ids = Vec::with_capacity(listings.len());
        for listing in listings.into_iter().take(self.max_listings) {
            content.push_str(&format!(
                "\n- {} in {}: {}, {} bd. /properties/{}",
                listing.title,
                listing.city,
                price_label(listing),
                listing.bedrooms,
                listing.slug
            ));
            listing_ids.push(listing.public_id.clone());
        }
        content.push_str("\n\n");
        content.push_str(outro);

        Reply {
            content,
            handoff: false,
            listing_ids,
        }
    }
}

#[async_trait]
impl ReplyGenerator for ListingAssistant {
    async fn generate(&self, prompt: &Prompt) -> AssistantResult<Reply> {
        let latest = prompt.latest_user_turn().ok_or(AssistantError::EmptyPrompt)?;
        let intent = Intent::parse(&latest.content, &prompt.listings);
        debug!(?intent, listings = prompt.listings.len(), "parsed lead intent");

        if intent.handoff {
            return Ok(Reply {
                content: self.handoff_message.clone(),
                handoff: true,
                listing_ids: Vec::new(),
            });
        }

        if intent.greeting && !intent.has_criteria() {
            return Ok(Reply::text(format!(
                "Hi! I'm {} from {}. Tell me the area, budget or number of bedrooms you have in mind \
                 and I'll suggest matching homes.",
                prompt.assistant_name, prompt.agency_name
            )));
        }

        if prompt.listings.is_empty() {
            return Ok(Reply::text(
                "We don't have any listings published right now. Leave your details and an agent will reach out.",
            ));
        }

        let mut candidates: Vec<&ListingSummary> = prompt
            .listings
            .iter()
            .filter(|listing| intent.matches(listing))
            .collect();
        candidates.sort_by(|a, b| rank(a, b));

        if !intent.has_criteria() {
            return Ok(self.listing_reply(
                "Here are some of our current listings:",
                candidates,
                "Tell me your budget, preferred area or number of bedrooms to narrow it down.",
            ));
        }

        if candidates.is_empty() {
            return Ok(Reply::text(
                "I couldn't find a listing matching that right now. Would you like an agent to \
                 look into other options for you?",
            ));
        }

        let intro = if candidates.len() == 1 {
            "I found one listing that matches:".to_string()
        } else {
            format!(
                "I found {} listings that match. Here are the best ones:",
                candidates.len()
            )
        };
        Ok(self.listing_reply(&intro, candidates, "Would you like to arrange a viewing?"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatTurn, PromptBuilder};

    fn listing(slug: &str, city: &str, kind: &str, listing_type: &str, price: i64, bedrooms: i64) -> ListingSummary {
        ListingSummary {
            public_id: format!("id-{slug}"),
            slug: slug.to_string(),
            title: slug.replace('-', " "),
            city: city.to_string(),
            property_type: kind.to_string(),
            listing_type: listing_type.to_string(),
            price,
            currency: "USD".to_string(),
            bedrooms,
            bathrooms: 1.0,
            featured: false,
        }
    }

    fn catalog() -> Vec<ListingSummary> {
        vec![
            listing("river-house", "Austin", "house", "sale", 650_000, 4),
            listing("garden-flat", "Austin", "apartment", "sale", 320_000, 2),
            listing("loft-rental", "Denver", "apartment", "rent", 2_100, 1),
            listing("family-home", "Denver", "house", "sale", 480_000, 3),
        ]
    }

    fn prompt_for(message: &str) -> Prompt {
        let config = AssistantConfig::default();
        PromptBuilder::new(&config, "Harbour Homes").build(&[ChatTurn::user(message)], catalog())
    }

    async fn reply_to(message: &str) -> Reply {
        ListingAssistant::new(&AssistantConfig::default())
            .generate(&prompt_for(message))
            .await
            .unwrap()
    }

    #[test]
    fn parses_budget_bedrooms_and_type() {
        let intent = Intent::parse("Looking to buy a 3 bedroom house in Denver under $500k", &catalog());
        assert_eq!(intent.max_price, Some(500_000));
        assert_eq!(intent.min_bedrooms, Some(3));
        assert_eq!(intent.city.as_deref(), Some("Denver"));
        assert_eq!(intent.listing_type, Some("sale"));
        assert_eq!(intent.property_type, Some("house"));
        assert!(!intent.handoff);
    }

    #[test]
    fn parses_spelled_out_amounts() {
        assert_eq!(parse_budget("budget of 1.2 million"), Some(1_200_000));
        assert_eq!(parse_budget("max 450,000."), Some(450_000));
        assert_eq!(parse_bedrooms("two bedrooms please"), Some(2));
        assert_eq!(parse_budget("nothing numeric"), None);
    }

    #[test]
    fn townhouse_is_not_a_house() {
        let intent = Intent::parse("any townhouses?", &[]);
        assert_eq!(intent.property_type, Some("townhouse"));
    }

    #[tokio::test]
    async fn filters_catalog_by_intent() {
        let reply = reply_to("Do you have a house in Denver under 500k?").await;
        assert_eq!(reply.listing_ids, vec!["id-family-home".to_string()]);
        assert!(reply.content.contains("/properties/family-home"));
        assert!(!reply.handoff);
    }

    #[tokio::test]
    async fn rentals_only_when_asked() {
        let reply = reply_to("I want to rent an apartment").await;
        assert_eq!(reply.listing_ids, vec!["id-loft-rental".to_string()]);
        assert!(reply.content.contains("USD 2,100/month"));
    }

    #[tokio::test]
    async fn viewing_requests_hand_off() {
        let reply = reply_to("Can I book a viewing for the river house?").await;
        assert!(reply.handoff);
        assert_eq!(reply.content, AssistantConfig::default().handoff_message);
    }

    #[tokio::test]
    async fn greeting_introduces_the_assistant() {
        let reply = reply_to("Hello there").await;
        assert!(reply.content.contains("Ava"));
        assert!(reply.content.contains("Harbour Homes"));
        assert!(reply.listing_ids.is_empty());
    }

    #[tokio::test]
    async fn no_match_offers_an_agent() {
        let reply = reply_to("5 bedroom house in Austin under 100k").await;
        assert!(reply.listing_ids.is_empty());
        assert!(reply.content.contains("couldn't find"));
    }

    #[tokio::test]
    async fn reply_is_capped() {
        let config = AssistantConfig {
            max_listings_in_reply: 2,
            ..AssistantConfig::default()
        };
        let reply = ListingAssistant::new(&config)
            .generate(&prompt_for("what do you have?"))
            .await
            .unwrap();
        assert_eq!(reply.listing_ids.len(), 2);
    }

    #[tokio::test]
    async fn prompt_without_user_turn_is_rejected() {
        let prompt = PromptBuilder::new(&AssistantConfig::default(), "Harbour Homes")
            .build(&[ChatTurn::assistant("Welcome!")], catalog());
        let err = ListingAssistant::new(&AssistantConfig::default())
            .generate(&prompt)
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::EmptyPrompt));
    }
}
