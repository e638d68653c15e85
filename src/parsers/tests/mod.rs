mod shopping_list_tests;
