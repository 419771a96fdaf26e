mod account;
mod shop;
mod spin;
