//! URLs of the pages the harvest fetches

use url::Url;

/// Builds index, info and listing URLs under one site root
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    fn join(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }

    /// Profile page: resolves aliases and carries counts and page count
    pub fn index_url(&self, account_id: &str) -> Result<String, url::ParseError> {
        Ok(self.join(&format!("{}/profile", account_id))?.to_string())
    }

    /// Info page: nickname and profile fields
    pub fn info_url(&self, account_id: &str) -> Result<String, url::ParseError> {
        Ok(self.join(&format!("{}/info", account_id))?.to_string())
    }

    /// One listing page, optionally restricted to original posts
    pub fn page_url(
        &self,
        account_id: &str,
        page: u64,
        original_only: bool,
    ) -> Result<String, url::ParseError> {
        let mut url = self.join(&format!("{}/profile", account_id))?;
        {
            let mut query = url.query_pairs_mut();
            if original_only {
                query.append_pair("filter", "1");
            }
            query.append_pair("page", &page.to_string());
        }
        Ok(url.to_string())
    }
}
