use clap::Subcommand;
use serde::Serialize;
use wordgate_core::{LifeShop, Moment, Payment};

use super::{print_json, service, CmdResult};

#[derive(Subcommand)]
pub enum ShopAction {
    /// Buy lives
    Buy {
        /// Learner id
        learner: i64,
        /// Number of lives
        amount: u32,
        /// Pay with "xp" or "currency"
        #[arg(long = "with", default_value = "currency")]
        payment: Payment,
    },
    /// Show the price of one life
    Prices,
}

#[derive(Serialize)]
struct Prices {
    xp: u32,
    currency: u32,
}

pub fn run(action: ShopAction) -> CmdResult {
    let mut svc = service()?;
    match action {
        ShopAction::Buy {
            learner,
            amount,
            payment,
        } => print_json(&svc.buy_lives(learner, amount, payment, Moment::now())?),
        ShopAction::Prices => {
            let shop = LifeShop::new(svc.config().shop.clone());
            print_json(&Prices {
                xp: shop.price(1, Payment::Xp),
                currency: shop.price(1, Payment::Currency),
            })
        }
    }
}
