use dashmap::DashMap;
use uuid::Uuid;

use super::model::{Product, User};

/// Well-known sample records.
pub mod sample {
    use uuid::Uuid;

    pub const ALICE: Uuid = Uuid::from_u128(0x6f1c_2a3e_0d4b_4c7e_9a51_1b2c_3d4e_5f01);
    pub const BOB: Uuid = Uuid::from_u128(0x6f1c_2a3e_0d4b_4c7e_9a51_1b2c_3d4e_5f02);
    pub const CAROL: Uuid = Uuid::from_u128(0x6f1c_2a3e_0d4b_4c7e_9a51_1b2c_3d4e_5f03);

    pub const KEYBOARD: i32 = 1;
    pub const MONITOR: i32 = 2;
}

/// In-memory users and products.
#[derive(Debug, Default)]
pub struct CatalogStore {
    users: DashMap<Uuid, User>,
    products: DashMap<i32, Product>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_data() -> Self {
        let store = Self::new();
        for (id, name, age) in [
            (sample::ALICE, "Alice", 34),
            (sample::BOB, "Bob", 27),
            (sample::CAROL, "Carol", 41),
        ] {
            store.insert_user(User {
                id,
                name: name.to_string(),
                age,
            });
        }
        for (id, name, price) in [
            (sample::KEYBOARD, "Keyboard", 49.9),
            (sample::MONITOR, "Monitor", 219.0),
        ] {
            store.insert_product(Product {
                id,
                name: name.to_string(),
                price,
            });
        }
        store
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn user(&self, id: &Uuid) -> Option<User> {
        self.users.get(id).map(|u| u.value().clone())
    }

    pub fn users<'a>(&self, ids: impl IntoIterator<Item = &'a Uuid>) -> Vec<User> {
        ids.into_iter().filter_map(|id| self.user(id)).collect()
    }

    pub fn product(&self, id: i32) -> Option<Product> {
        self.products.get(&id).map(|p| p.value().clone())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
