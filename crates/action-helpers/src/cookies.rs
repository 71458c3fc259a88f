//! Cookie helpers: thin stateless wrappers over single driver calls.

use cdp_driver::{Cookie, CookieDeletion, CookieParam};
use pagehand_core_types::PageId;

use crate::error::ActionError;
use crate::Actions;

impl Actions {
    /// Read cookies, optionally scoped to urls and filtered by name.
    pub async fn get_cookies(
        &self,
        page: PageId,
        urls: Option<Vec<String>>,
        name: Option<&str>,
    ) -> Result<Vec<Cookie>, ActionError> {
        let mut cookies = self.driver().get_cookies(page, urls).await?;
        if let Some(name) = name {
            cookies.retain(|cookie| cookie.name == name);
        }
        Ok(cookies)
    }

    pub async fn set_cookies(
        &self,
        page: PageId,
        cookies: Vec<CookieParam>,
    ) -> Result<(), ActionError> {
        self.driver().set_cookies(page, cookies).await?;
        Ok(())
    }

    pub async fn delete_cookies(
        &self,
        page: PageId,
        deletions: Vec<CookieDeletion>,
    ) -> Result<(), ActionError> {
        self.driver().delete_cookies(page, deletions).await?;
        Ok(())
    }
}
