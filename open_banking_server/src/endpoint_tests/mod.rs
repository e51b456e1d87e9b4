mod mocks;

mod accounts;
mod audit;
mod consents;
mod failures;
mod misc;
mod oauth;
mod tpps;
