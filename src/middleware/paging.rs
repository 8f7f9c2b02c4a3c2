use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};

pub const DEFAULT_PAGE_LENGTH: u32 = 20;

/// Optional `?page=&len=` (or `?p=&l=`) query parameters of list routes.
///
/// Without a page every item is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PageState {
    pub page_length: u32,
    pub page: Option<u32>,
}

impl Default for PageState {
    fn default() -> Self {
        PageState {
            page_length: DEFAULT_PAGE_LENGTH,
            page: None,
        }
    }
}

impl PageState {
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        match self.page {
            None => items,
            Some(page) => {
                let length = self.page_length.max(1) as usize;
                items
                    .into_iter()
                    .skip(page as usize * length)
                    .take(length)
                    .collect()
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PageState {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let length: Option<u32> = request
            .query_value("len")
            .and_then(|it| it.ok())
            .or_else(|| request.query_value("l").and_then(|it| it.ok()));

        let page: Option<u32> = request
            .query_value("page")
            .and_then(|it| it.ok())
            .or_else(|| request.query_value("p").and_then(|it| it.ok()));

        Outcome::Success(PageState {
            page_length: length.unwrap_or(DEFAULT_PAGE_LENGTH),
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_slice_items() {
        let items: Vec<u32> = (0..45).collect();
        let page = |page| PageState {
            page_length: 20,
            page: Some(page),
        };

        assert_eq!(PageState::default().apply(items.clone()).len(), 45);
        assert_eq!(page(0).apply(items.clone())[0], 0);
        assert_eq!(page(2).apply(items.clone()), vec![40, 41, 42, 43, 44]);
        assert!(page(3).apply(items).is_empty());
    }
}
