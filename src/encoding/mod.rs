pub mod url_encode;
