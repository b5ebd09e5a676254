pub mod http_form_notifier;
