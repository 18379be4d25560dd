// Cross-module tests for the recommendation engine
