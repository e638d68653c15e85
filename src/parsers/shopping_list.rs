use crate::candidate::ShoppingItem;
use crate::utils::clean_text;
use scraper::{ElementRef, Html, Selector};

/// Maximum ancestors to climb from a Delete button looking for its row
const MAX_ROW_DEPTH: usize = 10;

/// Parses the voice-assistant shopping list into items.
///
/// Rows are found by their list-item markup; when the markup is unknown,
/// each "Delete" button is walked up to the container that also holds its
/// "Edit" button.
pub fn parse(html: &str) -> Vec<ShoppingItem> {
    let doc = Html::parse_document(html);
    let row_selector =
        Selector::parse("[data-testid*='list-item'], .mls-item, .shopping-list-item").unwrap();

    let mut rows: Vec<ElementRef> = doc.select(&row_selector).collect();
    if rows.is_empty() {
        ::log::debug!("No list item markup found, locating rows through Delete buttons");
        rows = rows_from_delete_buttons(&doc);
    }

    let items: Vec<ShoppingItem> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match item_name(row) {
            Some(name) => {
                ::log::info!("Scraped item {}: {}", index + 1, name);
                Some(ShoppingItem::new(name))
            }
            None => {
                ::log::warn!("Could not extract item name from row {}", index);
                None
            }
        })
        .collect();

    if items.is_empty() {
        ::log::info!("No items found in shopping list");
    }
    items
}

fn button_text_is(button: ElementRef, label: &str) -> bool {
    clean_text(&button.text().collect::<String>()) == label
}

fn rows_from_delete_buttons<'a>(doc: &'a Html) -> Vec<ElementRef<'a>> {
    let button_selector = Selector::parse("button").unwrap();

    doc.select(&button_selector)
        .filter(|button| button_text_is(*button, "Delete"))
        .filter_map(|delete| {
            let mut current = delete;
            for _ in 0..MAX_ROW_DEPTH {
                current = current.parent().and_then(ElementRef::wrap)?;
                let deletes = current
                    .select(&button_selector)
                    .filter(|b| button_text_is(*b, "Delete"))
                    .count();
                if deletes > 1 {
                    // climbed past the row into the list itself
                    return None;
                }
                let has_edit = current
                    .select(&button_selector)
                    .any(|b| button_text_is(b, "Edit"));
                if has_edit && item_name(current).is_some() {
                    return Some(current);
                }
            }
            None
        })
        .collect()
}

/// Row chrome that is never an item name
fn is_chrome(line: &str) -> bool {
    line == "Edit"
        || line == "Delete"
        || line.contains("Show search")
        || line.starts_with("Added")
        || line.starts_with("Edited")
        || line.ends_with(" ago")
}

/// First substantial text line of a row
fn item_name(row: ElementRef) -> Option<String> {
    row.text()
        .map(clean_text)
        .filter(|line| !line.is_empty())
        .find(|line| !is_chrome(line) && (3..100).contains(&line.chars().count()))
}
