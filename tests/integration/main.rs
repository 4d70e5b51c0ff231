//! Integration tests: scripted market data driven through the scanner
//! and read back through the query façade.

mod scanner_flow;
