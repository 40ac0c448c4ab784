pub mod campaigns;
pub mod channels;
pub mod health;
pub mod landers;
pub mod offer_sources;
pub mod offers;
pub mod postback;
pub mod reports;
pub mod track;
