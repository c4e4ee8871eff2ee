mod map_usage_tests;
mod moderation_tests;
mod properties_tests;
