use tracing::{info, warn};

use crate::article::{EnrichedArticle, Enricher};
use crate::fetcher::FeedItem;
use crate::images::{DisplayImage, Normalizer};

/// Everything the page template needs to draw one article.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: String,
    pub summary: String,
    /// Normalized image inlined as a `data:` URI
    pub image_src: String,
    pub warning: Option<String>,
}

impl Card {
    pub fn new(article: EnrichedArticle, image: &DisplayImage) -> Self {
        let image_src = image.to_data_uri().unwrap_or_else(|err| {
            warn!(link = %article.item.link, error = %err, "Failed to encode card image");
            String::new()
        });

        Self {
            image_src,
            published: article.item.published_display(),
            title: article.item.title,
            link: article.item.link,
            source: article.item.source,
            summary: article.summary,
            warning: article.warning,
        }
    }
}

/// Enrich `items` in feed order until `quantity` cards exist, normalizing
/// each article's lead image to `image_max_width`.
///
/// Enrichment errors are caught here, per item, so one bad page only costs
/// its own summary.
pub async fn build_cards(
    items: &[FeedItem],
    quantity: usize,
    enricher: &Enricher,
    normalizer: &Normalizer,
    image_max_width: u32,
) -> Vec<Card> {
    let mut cards = Vec::with_capacity(quantity.min(items.len()));

    for item in items.iter().take(quantity) {
        let result = enricher.enrich(&item.link).await;
        if let Err(err) = &result {
            warn!(link = %item.link, error = %err, "Failed to enrich article");
        }
        let article = EnrichedArticle::from_result(item.clone(), result);
        let image = normalizer
            .normalize(article.top_image.as_deref(), image_max_width)
            .await;
        cards.push(Card::new(article, &image));
    }

    info!(
        rendered = cards.len(),
        available = items.len(),
        "Built news cards"
    );
    cards
}
