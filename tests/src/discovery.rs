mod integration;
mod pipeline;
