use crate::candidate::ShoppingItem;
use crate::parsers::shopping_list;

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[ShoppingItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_rows_from_list_item_markup() {
        let html = r#"<div class="virtual-list">
            <div data-testid="list-item-1">
                <span>2% milk</span><span>Added 2 hours ago</span>
                <button>Edit</button><button>Delete</button>
            </div>
            <div data-testid="list-item-2">
                <span>Added yesterday</span><span>paper towels</span>
                <button>Edit</button><button>Delete</button>
            </div>
            <div data-testid="list-item-3"><button>Edit</button><button>Delete</button></div>
        </div>"#;

        let items = shopping_list::parse(html);
        assert_eq!(names(&items), vec!["2% milk", "paper towels"]);
        assert!(items.iter().all(|i| i.quantity == 1));
    }

    #[test]
    fn test_rows_from_delete_buttons() {
        let html = r#"<ul>
            <li><div class="row">
                <div class="name">bananas</div>
                <div class="meta">Edited 3 days ago</div>
                <div><button>Edit</button><button>Delete</button></div>
            </div></li>
            <li><div class="row">
                <div>Show search results</div>
                <div>ok</div>
                <div><button>Edit</button><button>Delete</button></div>
            </div></li>
        </ul>"#;

        let items = shopping_list::parse(html);
        assert_eq!(names(&items), vec!["bananas"]);
    }

    #[test]
    fn test_long_lines_are_not_names() {
        let long = "x".repeat(120);
        let html = format!(
            r#"<div class="mls-item"><span>{long}</span><span>dish soap</span></div>"#
        );
        let items = shopping_list::parse(&html);
        assert_eq!(names(&items), vec!["dish soap"]);
    }

    #[test]
    fn test_empty_list() {
        let html = "<html><body><h1>Alexa Shopping List</h1><p>Your list is empty</p></body></html>";
        assert!(shopping_list::parse(html).is_empty());
    }
}
