use std::collections::HashMap;

use super::TokenId;

/// A tokenizer-specific table of token ids for the literal tokens this
/// crate needs to bias or inspect. Built once per oracle instance at
/// construction time.
#[derive(Debug, Clone)]
pub struct TokenTable {
    ids: HashMap<&'static str, TokenId>,
}

impl TokenTable {
    pub fn new(white: TokenId, black: TokenId, yes: TokenId, no: TokenId) -> Self {
        let mut ids = HashMap::new();
        ids.insert("white", white);
        ids.insert("black", black);
        ids.insert("yes", yes);
        ids.insert("no", no);
        TokenTable { ids }
    }

    pub fn white(&self) -> TokenId {
        self.ids["white"]
    }

    pub fn black(&self) -> TokenId {
        self.ids["black"]
    }

    pub fn yes(&self) -> TokenId {
        self.ids["yes"]
    }

    pub fn no(&self) -> TokenId {
        self.ids["no"]
    }

    /// The `gpt3_5` packaged model's token table.
    pub fn gpt3_5() -> Self {
        TokenTable::new(7534, 11708, 9891, 2360)
    }

    /// The `gpt4` packaged model's token table.
    pub fn gpt4() -> Self {
        TokenTable::new(4158, 11708, 9891, 2360)
    }
}
